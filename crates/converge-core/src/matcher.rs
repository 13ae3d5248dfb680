//! Matching existing resource instances to a target generation

use crate::resource::Resource;
use crate::types::Generation;

/// Picks which existing instance of a name carries forward into a pass
#[derive(Debug, Clone, Copy)]
pub struct ResourceMatcher<'a> {
    existing: &'a [Resource],
    target: Generation,
    from: Generation,
}

impl<'a> ResourceMatcher<'a> {
    /// Create matcher over the instances of one stack
    #[must_use]
    pub fn new(existing: &'a [Resource], target: Generation, from: Generation) -> Self {
        Self {
            existing,
            target,
            from,
        }
    }

    /// Best existing instance of `name`, if any
    #[must_use]
    pub fn best_existing_resource(&self, name: &str) -> Option<&'a Resource> {
        best_existing_resource(name, self.existing, self.target, self.from)
    }
}

/// Best existing instance of `name` for converging from `from` to `target`
///
/// An instance already belonging to `target` wins outright. Otherwise the
/// last scanned instance belonging to `from` is returned. `None` means a new
/// instance has to be created.
#[must_use]
pub fn best_existing_resource<'a>(
    name: &str,
    existing: &'a [Resource],
    target: Generation,
    from: Generation,
) -> Option<&'a Resource> {
    let mut candidate = None;

    for rsrc in existing.iter().filter(|r| r.name == name) {
        let generation = Some(rsrc.template_key);
        if generation == target {
            return Some(rsrc);
        }
        if generation == from {
            candidate = Some(rsrc);
        }
    }

    candidate
}
