use crate::node::Node;

pub const DEFAULT_TRANSPORT: &str = "raw";
pub const DEFAULT_PARAMETER_NAME: &str = "point_cloud_transport";

/// Which transport a subscriber should use.
///
/// The node's private parameter `~<parameter_name>` wins over the default
/// given here, so the choice can be changed without touching code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHints {
    default_transport: String,
    parameter_name: String,
}

impl Default for TransportHints {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSPORT)
    }
}

impl TransportHints {
    pub fn new<S: Into<String>>(default_transport: S) -> Self {
        Self {
            default_transport: default_transport.into(),
            parameter_name: DEFAULT_PARAMETER_NAME.to_string(),
        }
    }

    pub fn with_parameter_name<S: Into<String>>(mut self, parameter_name: S) -> Self {
        self.parameter_name = parameter_name.into();
        self
    }

    pub fn default_transport(&self) -> &str {
        &self.default_transport
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn transport(&self, node: &Node) -> String {
        node.param_or(
            &format!("~{}", self.parameter_name),
            self.default_transport.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let hints = TransportHints::default();
        assert_eq!(hints.default_transport(), "raw");
        assert_eq!(hints.parameter_name(), "point_cloud_transport");
    }

    #[test]
    fn parameter_name_is_replaced() {
        let hints = TransportHints::new("lz4").with_parameter_name("cloud_transport");
        assert_eq!(hints.default_transport(), "lz4");
        assert_eq!(hints.parameter_name(), "cloud_transport");
    }
}
