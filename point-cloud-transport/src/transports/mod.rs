//! Transports compiled into the crate.

pub mod raw;
#[cfg(feature = "lz4")]
pub mod lz4;

use crate::loader::{PubLoader, SubLoader};
use crate::plugin::{PublisherPlugin, SubscriberPlugin, publisher_lookup_name, subscriber_lookup_name};
use crate::simple::{SimplePublisherPlugin, SimpleSubscriberPlugin};

pub(crate) fn declare_publishers(loader: &mut PubLoader) {
    loader.declare(publisher_lookup_name(raw::TRANSPORT), || {
        Ok(Box::new(SimplePublisherPlugin::new(raw::RawCodec)) as Box<dyn PublisherPlugin>)
    });
    #[cfg(feature = "lz4")]
    loader.declare(publisher_lookup_name(lz4::TRANSPORT), || {
        Ok(Box::new(SimplePublisherPlugin::new(lz4::Lz4Codec)) as Box<dyn PublisherPlugin>)
    });
}

pub(crate) fn declare_subscribers(loader: &mut SubLoader) {
    loader.declare(subscriber_lookup_name(raw::TRANSPORT), || {
        Ok(Box::new(SimpleSubscriberPlugin::new(raw::RawCodec)) as Box<dyn SubscriberPlugin>)
    });
    #[cfg(feature = "lz4")]
    loader.declare(subscriber_lookup_name(lz4::TRANSPORT), || {
        Ok(Box::new(SimpleSubscriberPlugin::new(lz4::Lz4Codec)) as Box<dyn SubscriberPlugin>)
    });
}
