use crate::document::Document;
use crate::target::TargetDescriptor;

use super::core::Session;
use super::options::{SessionOptions, SessionUpdate};

/// One-element convenience wrapper for hosts that manage a single element's
/// lifecycle: the session is built around a one-shot target list on mount
/// and killed when the wrapper drops.
pub struct SingleTarget {
    session: Session,
}

impl SingleTarget {
    pub fn mount(
        document: &Document,
        descriptor: TargetDescriptor,
        options: SessionOptions,
    ) -> Self {
        Self {
            session: Session::create(document, descriptor, options),
        }
    }

    /// Swap the monitored element, rebooting the underlying session.
    pub fn set_target(&self, descriptor: TargetDescriptor) {
        self.session
            .reboot(SessionUpdate::new().with_targets(descriptor));
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for SingleTarget {
    fn drop(&mut self) {
        self.session.kill();
    }
}
