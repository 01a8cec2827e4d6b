use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use zenoh::liveliness::LivelinessToken;
use zenoh::{Result, Session, Wait};

use crate::{
    Builder,
    context::GlobalCounter,
    entity::{EndpointEntity, EntityKind, NodeEntity, TypeInfo},
    param::Parameters,
    pubsub::{RawPublisherBuilder, RawSubscriberBuilder},
    qos::QosProfile,
    topic_name::{self, TopicNameError},
};

/// A named participant. Cloning is cheap and keeps the node alive.
#[derive(Clone)]
pub struct Node {
    pub entity: NodeEntity,
    session: Arc<Session>,
    counter: Arc<GlobalCounter>,
    parameters: Parameters,
    _lv_token: Arc<LivelinessToken>,
}

pub struct NodeBuilder {
    pub domain_id: usize,
    pub name: String,
    pub namespace: String,
    pub parameters: Parameters,
    pub session: Arc<Session>,
    pub counter: Arc<GlobalCounter>,
}

impl NodeBuilder {
    pub fn with_namespace<S: AsRef<str>>(mut self, namespace: S) -> Self {
        self.namespace = namespace.as_ref().to_owned();
        self
    }

    /// `name` is resolved against this node when the node is built.
    pub fn with_parameter<K: Into<String>, V: serde::Serialize>(self, name: K, value: V) -> Self {
        let name = name.into();
        if let Err(e) = self.parameters.set(name.clone(), value) {
            tracing::warn!("[NODE] Dropping parameter '{}': {}", name, e);
        }
        self
    }

    pub fn with_parameters(self, parameters: &Parameters) -> Self {
        self.parameters.merge(parameters);
        self
    }

    pub fn with_parameters_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let parameters = Parameters::from_file(path)?;
        Ok(self.with_parameters(&parameters))
    }
}

impl Builder for NodeBuilder {
    type Output = Node;

    fn build(self) -> Result<Node> {
        topic_name::validate_namespace(&self.namespace)?;
        topic_name::validate_node_name(&self.name)?;

        let entity = NodeEntity {
            domain_id: self.domain_id,
            z_id: self.session.zid(),
            id: self.counter.increment(),
            name: self.name,
            namespace: self.namespace,
        };

        // Relative and private parameter names given to the builder are
        // resolved now that the node identity is fixed.
        let parameters = Parameters::new();
        for (name, value) in self.parameters.entries() {
            let resolved = topic_name::resolve_name(&name, &entity.namespace, &entity.name)?;
            parameters.set(resolved, value)?;
        }

        let lv_token = self
            .session
            .liveliness()
            .declare_token(entity.lv_token_key_expr()?)
            .wait()?;
        tracing::debug!("[NODE] Node ready: {}", entity.name);

        Ok(Node {
            entity,
            session: self.session,
            counter: self.counter,
            parameters,
            _lv_token: Arc::new(lv_token),
        })
    }
}

impl Node {
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    pub fn namespace(&self) -> &str {
        &self.entity.namespace
    }

    pub fn resolve_name(&self, name: &str) -> std::result::Result<String, TopicNameError> {
        topic_name::resolve_name(name, &self.entity.namespace, &self.entity.name)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Look up a parameter by relative, private or absolute name.
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let resolved = self.resolve_name(name).ok()?;
        self.parameters.get(&resolved)
    }

    pub fn param_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.param(name).unwrap_or(default)
    }

    pub fn set_param<V: serde::Serialize>(&self, name: &str, value: V) -> Result<()> {
        let resolved = self.resolve_name(name)?;
        self.parameters.set(resolved, value)
    }

    fn endpoint(&self, topic: &str, kind: EntityKind, type_info: TypeInfo) -> EndpointEntity {
        EndpointEntity {
            id: self.counter.increment(),
            node: self.entity.clone(),
            kind,
            topic: topic.to_string(),
            type_info,
            qos: QosProfile::default(),
        }
    }

    /// Publisher of already-encoded payloads. `topic` is resolved at build time.
    pub fn create_pub(&self, topic: &str, type_info: TypeInfo) -> RawPublisherBuilder {
        RawPublisherBuilder::new(
            self.endpoint(topic, EntityKind::Publisher, type_info),
            self.session.clone(),
        )
    }

    /// Subscriber handing raw payloads to a handler. `topic` is resolved at build time.
    pub fn create_sub(&self, topic: &str, type_info: TypeInfo) -> RawSubscriberBuilder {
        RawSubscriberBuilder::new(
            self.endpoint(topic, EntityKind::Subscription, type_info),
            self.session.clone(),
        )
    }
}
