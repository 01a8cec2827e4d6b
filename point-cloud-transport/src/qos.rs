use std::fmt;

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy)]
pub enum QosReliability {
    #[default]
    Reliable,
    BestEffort,
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum QosHistory {
    KeepLast(usize),
    KeepAll,
}

impl Default for QosHistory {
    fn default() -> Self {
        Self::KeepLast(10)
    }
}

impl QosHistory {
    /// A queue size of zero means "unbounded", as it does for ROS publishers.
    pub fn from_queue_size(queue_size: usize) -> Self {
        match queue_size {
            0 => Self::KeepAll,
            depth => Self::KeepLast(depth),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::KeepLast(depth) => *depth,
            Self::KeepAll => usize::MAX,
        }
    }
}

/// `TransientLocal` is how a latched topic is expressed.
#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy)]
pub enum QosDurability {
    TransientLocal,
    #[default]
    Volatile,
}

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy)]
pub struct QosProfile {
    pub reliability: QosReliability,
    pub durability: QosDurability,
    pub history: QosHistory,
}

impl QosProfile {
    pub fn from_queue_size(queue_size: usize, latch: bool) -> Self {
        Self {
            history: QosHistory::from_queue_size(queue_size),
            durability: if latch {
                QosDurability::TransientLocal
            } else {
                QosDurability::Volatile
            },
            ..Default::default()
        }
    }

    pub fn is_latched(&self) -> bool {
        self.durability == QosDurability::TransientLocal
    }

    /// Compact form used inside liveliness keys: `<reliability>:<durability>:<depth>`.
    pub fn encode(&self) -> String {
        let reliability = match self.reliability {
            QosReliability::Reliable => 1,
            QosReliability::BestEffort => 2,
        };
        let durability = match self.durability {
            QosDurability::TransientLocal => 1,
            QosDurability::Volatile => 2,
        };
        let depth = match self.history {
            QosHistory::KeepLast(depth) => depth.to_string(),
            QosHistory::KeepAll => "all".to_string(),
        };
        format!("{reliability}:{durability}:{depth}")
    }
}

impl fmt::Display for QosProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reliability={:?} durability={:?} history={:?}",
            self.reliability, self.durability, self.history
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_size_maps_to_history() {
        assert_eq!(QosHistory::from_queue_size(0), QosHistory::KeepAll);
        assert_eq!(QosHistory::from_queue_size(5), QosHistory::KeepLast(5));
        assert_eq!(QosHistory::KeepAll.depth(), usize::MAX);
    }

    #[test]
    fn latch_maps_to_transient_local() {
        let qos = QosProfile::from_queue_size(1, true);
        assert!(qos.is_latched());
        assert_eq!(qos.encode(), "1:1:1");
        assert_eq!(QosProfile::from_queue_size(0, false).encode(), "1:2:all");
    }
}
