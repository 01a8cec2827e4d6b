use std::fmt::Display;

use sha2::Digest;
use zenoh::{Result, key_expr::KeyExpr, session::ZenohId};

use crate::{attachment::GidArray, qos::QosProfile, topic_name::mangle};

const EMPTY_NAMESPACE: &str = "%";
pub const ADMIN_SPACE: &str = "@pct_lv";

#[derive(Default, Debug, Hash, strum::EnumString, strum::Display, Eq, PartialEq, Clone, Copy)]
pub enum EntityKind {
    #[default]
    #[strum(serialize = "NN")]
    Node,
    #[strum(serialize = "MP")]
    Publisher,
    #[strum(serialize = "MS")]
    Subscription,
}

impl EntityKind {
    /// The kind on the other end of a topic.
    pub fn peer(&self) -> Option<EntityKind> {
        match self {
            Self::Publisher => Some(Self::Subscription),
            Self::Subscription => Some(Self::Publisher),
            Self::Node => None,
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct TypeHash {
    pub version: u8,
    pub value: [u8; 32],
}

impl TypeHash {
    /// Hash of a message definition text.
    pub fn from_definition(definition: &str) -> Self {
        let digest = sha2::Sha256::digest(definition.as_bytes());
        let mut value = [0u8; 32];
        value.copy_from_slice(&digest);
        Self { version: 1, value }
    }

    pub fn to_rihs_string(&self) -> String {
        let hex: String = self.value.iter().map(|b| format!("{b:02x}")).collect();
        format!("RIHS{:02x}_{hex}", self.version)
    }
}

impl Display for TypeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rihs_string())
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub hash: TypeHash,
}

impl TypeInfo {
    pub fn new(name: &str, hash: TypeHash) -> Self {
        TypeInfo {
            name: name.to_string(),
            hash,
        }
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.hash)
    }
}

#[derive(Debug, Hash, Clone, PartialEq, Eq)]
pub struct NodeEntity {
    pub domain_id: usize,
    pub z_id: ZenohId,
    pub id: usize,
    pub name: String,
    pub namespace: String,
}

impl NodeEntity {
    fn namespace_chunk(&self) -> String {
        if self.namespace.is_empty() || self.namespace == "/" {
            EMPTY_NAMESPACE.to_string()
        } else {
            mangle(&self.namespace)
        }
    }

    // <ADMIN_SPACE>/<domain_id>/<zid>/<nid>/<nid>/NN/<namespace>/<node_name>
    pub fn lv_token_key_expr(&self) -> Result<KeyExpr<'static>> {
        let Self {
            domain_id,
            z_id,
            id,
            name,
            ..
        } = self;
        let namespace = self.namespace_chunk();
        let kind = EntityKind::Node;
        Ok(format!("{ADMIN_SPACE}/{domain_id}/{z_id}/{id}/{id}/{kind}/{namespace}/{name}").try_into()?)
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct EndpointEntity {
    pub id: usize,
    pub node: NodeEntity,
    pub kind: EntityKind,
    /// Fully resolved topic name.
    pub topic: String,
    pub type_info: TypeInfo,
    pub qos: QosProfile,
}

impl EndpointEntity {
    // <ADMIN_SPACE>/<domain_id>/<zid>/<nid>/<eid>/<kind>/<namespace>/<node_name>/<topic>/<type>/<hash>/<qos>
    pub fn lv_token_key_expr(&self) -> Result<KeyExpr<'static>> {
        let NodeEntity {
            domain_id,
            z_id,
            id: node_id,
            name: node_name,
            ..
        } = &self.node;
        let namespace = self.node.namespace_chunk();
        Ok(format!(
            "{ADMIN_SPACE}/{domain_id}/{z_id}/{node_id}/{}/{}/{namespace}/{node_name}/{}/{}/{}",
            self.id,
            self.kind,
            self.topic_chunks(),
            self.type_info.hash,
            self.qos.encode(),
        )
        .try_into()?)
    }

    /// Liveliness key expression matching every endpoint of the peer kind on the same topic and type.
    pub fn peer_key_expr(&self) -> Result<KeyExpr<'static>> {
        let peer = self
            .kind
            .peer()
            .ok_or_else(|| zenoh::Error::from("nodes have no topic peers"))?;
        Ok(format!(
            "{ADMIN_SPACE}/{}/*/*/*/{peer}/*/*/{}/{}/*",
            self.node.domain_id,
            self.topic_chunks(),
            self.type_info.hash,
        )
        .try_into()?)
    }

    // <domain_id>/<topic>/<type>/<hash>
    pub fn topic_key_expr(&self) -> Result<KeyExpr<'static>> {
        Ok(format!(
            "{}/{}/{}",
            self.node.domain_id,
            self.topic_chunks(),
            self.type_info.hash
        )
        .try_into()?)
    }

    fn topic_chunks(&self) -> String {
        let topic = self.topic.trim_matches('/');
        format!("{}/{}", mangle(topic), mangle(&self.type_info.name))
    }

    pub fn gid(&self) -> Result<GidArray> {
        let mut gid = GidArray::default();
        let hash = sha2::Sha256::digest(self.lv_token_key_expr()?.as_str().as_bytes());
        let len = gid.len();
        gid.copy_from_slice(&hash[..len]);
        Ok(gid)
    }
}

/// Node name and namespace carried by a liveliness key of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub node_name: String,
    pub namespace: String,
    pub kind: EntityKind,
}

impl RemoteEndpoint {
    pub fn parse(key_expr: &str) -> Option<Self> {
        let chunks: Vec<&str> = key_expr.split('/').collect();
        if chunks.first() != Some(&ADMIN_SPACE) || chunks.len() < 8 {
            return None;
        }
        let kind = chunks[5].parse().ok()?;
        let namespace = match chunks[6] {
            EMPTY_NAMESPACE => "/".to_string(),
            ns => ns.replace('%', "/"),
        };
        Some(Self {
            node_name: chunks[7].to_string(),
            namespace,
            kind,
        })
    }
}
