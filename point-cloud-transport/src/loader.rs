//! In-process class registry for transport plugins.
//!
//! Classes are declared under a lookup name together with a factory. A
//! declared class is not necessarily loadable: its factory may fail, which
//! is what separates the declared transports from the loadable ones.

use std::sync::Arc;

use crate::error::LoaderError;
use crate::plugin::{
    PACKAGE, PUBLISHER_BASE_CLASS, PublisherPlugin, SUBSCRIBER_BASE_CLASS, SubscriberPlugin,
};
use crate::transports;

pub type Factory<P> = Arc<dyn Fn() -> Result<Box<P>, String> + Send + Sync>;

pub struct ClassLoader<P: ?Sized> {
    package: String,
    base_class: String,
    classes: Vec<(String, Factory<P>)>,
}

pub type PubLoader = ClassLoader<dyn PublisherPlugin>;
pub type SubLoader = ClassLoader<dyn SubscriberPlugin>;

impl<P: ?Sized> ClassLoader<P> {
    pub fn new(package: &str, base_class: &str) -> Self {
        Self {
            package: package.to_string(),
            base_class: base_class.to_string(),
            classes: Vec::new(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    /// Declaring an existing lookup name replaces its factory in place.
    pub fn declare<S, F>(&mut self, lookup_name: S, factory: F)
    where
        S: Into<String>,
        F: Fn() -> Result<Box<P>, String> + Send + Sync + 'static,
    {
        let lookup_name = lookup_name.into();
        let factory: Factory<P> = Arc::new(factory);
        match self.classes.iter_mut().find(|(name, _)| *name == lookup_name) {
            Some(entry) => entry.1 = factory,
            None => self.classes.push((lookup_name, factory)),
        }
    }

    pub fn undeclare(&mut self, lookup_name: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|(name, _)| name != lookup_name);
        self.classes.len() != before
    }

    /// Lookup names in declaration order.
    pub fn declared_classes(&self) -> Vec<String> {
        self.classes.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_class_declared(&self, lookup_name: &str) -> bool {
        self.classes.iter().any(|(name, _)| name == lookup_name)
    }

    pub fn create_instance(&self, lookup_name: &str) -> Result<Box<P>, LoaderError> {
        let (_, factory) = self
            .classes
            .iter()
            .find(|(name, _)| name == lookup_name)
            .ok_or_else(|| LoaderError::UnknownClass {
                lookup_name: lookup_name.to_string(),
                base_class: self.base_class.clone(),
            })?;
        factory().map_err(|reason| LoaderError::CreateClass {
            lookup_name: lookup_name.to_string(),
            reason,
        })
    }
}

impl ClassLoader<dyn PublisherPlugin> {
    /// Publisher-side loader with every compiled-in transport declared.
    pub fn with_builtin() -> Self {
        let mut loader = Self::new(PACKAGE, PUBLISHER_BASE_CLASS);
        transports::declare_publishers(&mut loader);
        loader
    }
}

impl ClassLoader<dyn SubscriberPlugin> {
    /// Subscriber-side loader with every compiled-in transport declared.
    pub fn with_builtin() -> Self {
        let mut loader = Self::new(PACKAGE, SUBSCRIBER_BASE_CLASS);
        transports::declare_subscribers(&mut loader);
        loader
    }
}
