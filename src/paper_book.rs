// =============================================================================
// Paper Book — simulated positions for paper-mode trading
// =============================================================================
//
// In paper mode no request reaches the broker, so exits need a local record
// of what was "bought". The book keeps open lots and an audit list of closed
// ones. Thread-safety: all mutable state is behind `parking_lot::RwLock`.
// =============================================================================

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A simulated option lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub tradingsymbol: String,
    /// "CE" or "PE".
    pub instrument_type: String,
    pub quantity: i64,
    pub opened_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
}

/// Thread-safe book of simulated open and closed lots.
pub struct PaperBook {
    open: RwLock<Vec<PaperPosition>>,
    closed: RwLock<Vec<PaperPosition>>,
}

impl PaperBook {
    pub fn new() -> Self {
        Self {
            open: RwLock::new(Vec::new()),
            closed: RwLock::new(Vec::new()),
        }
    }

    /// Record a simulated buy and return its UUID.
    pub fn open_position(
        &self,
        tradingsymbol: &str,
        instrument_type: &str,
        quantity: i64,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let pos = PaperPosition {
            id: id.clone(),
            tradingsymbol: tradingsymbol.to_string(),
            instrument_type: instrument_type.to_string(),
            quantity,
            opened_at: Utc::now().to_rfc3339(),
            closed_at: None,
        };

        info!(id = %id, tradingsymbol, quantity, "paper position opened");
        self.open.write().push(pos);
        id
    }

    /// Close every open lot matching `tradingsymbol`; returns how many
    /// closed.
    pub fn close_symbol(&self, tradingsymbol: &str) -> usize {
        let mut open = self.open.write();
        let mut closed = self.closed.write();
        let now = Utc::now().to_rfc3339();

        let before = open.len();
        let mut i = 0;
        while i < open.len() {
            if open[i].tradingsymbol == tradingsymbol {
                let mut pos = open.remove(i);
                pos.closed_at = Some(now.clone());
                info!(id = %pos.id, tradingsymbol, "paper position closed");
                closed.push(pos);
            } else {
                i += 1;
            }
        }
        before - open.len()
    }

    /// Snapshot of all open lots.
    pub fn open_positions(&self) -> Vec<PaperPosition> {
        self.open.read().clone()
    }

    /// The most recent `count` closed lots (newest first).
    pub fn closed_positions(&self, count: usize) -> Vec<PaperPosition> {
        let closed = self.closed.read();
        closed.iter().rev().take(count).cloned().collect()
    }
}

impl Default for PaperBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PaperBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperBook")
            .field("open", &self.open.read().len())
            .field("closed", &self.closed.read().len())
            .finish()
    }
}
