//! Name resolution for topics and parameters.
//!
//! Topics and parameters share the same rules: absolute names are kept,
//! relative names are placed under the node namespace, and `~` names are
//! placed under `<namespace>/<node_name>`.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicNameError {
    #[error("name is empty")]
    Empty,
    #[error("name '{0}' contains an invalid component")]
    InvalidCharacters(String),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid node name: {0}")]
    InvalidNodeName(String),
}

/// Components start with a letter or underscore, then alphanumerics or underscores.
pub(crate) fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {
            bytes[1..].iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
        }
        _ => false,
    }
}

fn validate_components(name: &str, path: &str) -> Result<(), TopicNameError> {
    if path
        .split('/')
        .any(|part| !part.is_empty() && !is_valid_component(part))
    {
        return Err(TopicNameError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_namespace(namespace: &str) -> Result<(), TopicNameError> {
    if namespace.is_empty() || namespace == "/" {
        return Ok(());
    }
    if !namespace.starts_with('/') || namespace.ends_with('/') {
        return Err(TopicNameError::InvalidNamespace(namespace.to_string()));
    }
    validate_components(namespace, namespace)
        .map_err(|_| TopicNameError::InvalidNamespace(namespace.to_string()))
}

pub(crate) fn validate_node_name(node_name: &str) -> Result<(), TopicNameError> {
    if !is_valid_component(node_name) {
        return Err(TopicNameError::InvalidNodeName(node_name.to_string()));
    }
    Ok(())
}

/// Resolve `name` against a node's namespace and name.
///
/// ```
/// use point_cloud_transport::topic_name::resolve_name;
///
/// assert_eq!(resolve_name("/points", "/robot", "lidar").unwrap(), "/points");
/// assert_eq!(resolve_name("points", "/robot", "lidar").unwrap(), "/robot/points");
/// assert_eq!(resolve_name("~points", "/robot", "lidar").unwrap(), "/robot/lidar/points");
/// ```
pub fn resolve_name(name: &str, namespace: &str, node_name: &str) -> Result<String, TopicNameError> {
    if name.is_empty() {
        return Err(TopicNameError::Empty);
    }
    validate_namespace(namespace)?;
    validate_node_name(node_name)?;

    let namespace = if namespace == "/" { "" } else { namespace };

    let (prefix, rest) = if let Some(abs) = name.strip_prefix('/') {
        (String::new(), abs)
    } else if let Some(private) = name.strip_prefix('~') {
        (
            format!("{namespace}/{node_name}"),
            private.strip_prefix('/').unwrap_or(private),
        )
    } else {
        (namespace.to_string(), name)
    };

    let rest = rest.trim_end_matches('/');
    validate_components(name, rest)?;

    let resolved = match (prefix.is_empty(), rest.is_empty()) {
        (true, true) => return Err(TopicNameError::InvalidCharacters(name.to_string())),
        (true, false) => format!("/{rest}"),
        (false, true) => prefix,
        (false, false) => format!("{prefix}/{rest}"),
    };
    Ok(resolved)
}

/// Topic carrying `transport` for `base_topic`.
pub fn transport_topic(base_topic: &str, transport: &str) -> String {
    format!("{}/{}", base_topic.trim_end_matches('/'), transport)
}

/// Last `/`-separated segment of a resolved name.
pub fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

pub(crate) fn mangle(name: &str) -> String {
    name.replace('/', "%")
}
