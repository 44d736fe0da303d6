//! Thread-local registry holding at most one context per thread.
//!
//! Operator code that cannot thread a context through its call chain looks
//! it up here. Each party runs on its own thread, so every thread has its
//! own slot.

use crate::config::{protocol_name, Aby3Config, ABY3_PROTOCOL_NAME};
use crate::context::Aby3Context;
use crate::error::{Error, Result};
use crate::networking::SyncNetworking;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

struct Instance {
    config: Aby3Config,
    context: Rc<Aby3Context>,
}

thread_local! {
    static INSTANCE: RefCell<Option<Instance>> = RefCell::new(None);
}

/// Builds the context of this thread, running the seed handshake.
///
/// The protocol name must have been set with
/// [`init_protocol_name`](crate::config::init_protocol_name). Calling this
/// again with the same configuration returns the existing context without a
/// new handshake; a different configuration is rejected.
pub fn init_instance(
    config: &Aby3Config,
    network: Arc<dyn SyncNetworking>,
) -> Result<Rc<Aby3Context>> {
    let name = protocol_name()?;
    if name != ABY3_PROTOCOL_NAME {
        return Err(Error::UnknownProtocol(name));
    }

    let existing = INSTANCE.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|instance| (instance.config == *config, Rc::clone(&instance.context)))
    });
    match existing {
        Some((true, context)) => {
            tracing::debug!("reusing mpc instance of {}", config.party);
            Ok(context)
        }
        Some((false, _)) => Err(Error::AlreadyInitialized),
        None => {
            let context = Rc::new(Aby3Context::new(config, network)?);
            INSTANCE.with(|cell| {
                *cell.borrow_mut() = Some(Instance {
                    config: config.clone(),
                    context: Rc::clone(&context),
                })
            });
            Ok(context)
        }
    }
}

/// Returns the context of this thread.
pub fn mpc_instance() -> Result<Rc<Aby3Context>> {
    INSTANCE.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|instance| Rc::clone(&instance.context))
            .ok_or(Error::Uninitialized)
    })
}
