use std::any::Any;

use crate::reader::WireReader;

/// A resource that must be released once a read is over.
pub trait Disposable: Send + 'static {
    /// Release the resource. It may be called more than once.
    fn dispose(&mut self);
}

impl Disposable for Box<dyn WireReader> {
    fn dispose(&mut self) {
        self.release();
    }
}

struct Registration {
    resource: Box<dyn Any + Send>,
    release: fn(&mut Box<dyn Any + Send>),
}

/// The resources acquired during a single read.
///
/// Ownership of a resource moves into the scope as soon as it is created.
/// Every registered resource is released exactly once: either by
/// [`release_all`](Self::release_all) or, if the read never got that far
/// (e.g. its future was dropped), when the scope itself is dropped.
#[derive(Default)]
pub struct DisposalScope {
    registrations: Vec<Registration>,
}

impl DisposalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `resource` and return a handle to use it for the rest of the read.
    pub fn register<R: Disposable>(&mut self, resource: R) -> &mut R {
        fn release<R: Disposable>(resource: &mut Box<dyn Any + Send>) {
            if let Some(resource) = resource.as_mut().downcast_mut::<R>() {
                resource.dispose();
            }
        }

        self.registrations.push(Registration {
            resource: Box::new(resource),
            release: release::<R>,
        });
        self.registrations
            .last_mut()
            .and_then(|r| r.resource.downcast_mut::<R>())
            .expect("The registration we just pushed holds a value of type `R`")
    }

    /// Release every registered resource, most recent first.
    pub fn release_all(&mut self) {
        while let Some(mut registration) = self.registrations.pop() {
            (registration.release)(&mut registration.resource);
        }
    }

    /// The number of resources still waiting to be released.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Drop for DisposalScope {
    fn drop(&mut self) {
        if !self.registrations.is_empty() {
            tracing::trace!(
                pending = self.registrations.len(),
                "Releasing resources left over by an interrupted read"
            );
            self.release_all();
        }
    }
}

impl std::fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalScope")
            .field("pending", &self.registrations.len())
            .finish()
    }
}
