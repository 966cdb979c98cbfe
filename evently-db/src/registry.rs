//! Model registry
//!
//! A service locator that entity accessors register against and that callers
//! resolve from at call time. The booking gate never holds a direct reference
//! to the event model, so the two definitions carry no load-order dependency:
//! the event model may be registered before or after the gate is built, as
//! long as it is present when a booking is checked.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::db::repos::DbError;

/// An accessor type that can be registered, with the name it is known by.
///
/// Usually implemented for a `dyn Trait`, so the registered name and the
/// lookup key cannot disagree.
pub trait Model: Send + Sync + 'static {
    const NAME: &'static str;
}

struct Entry {
    name: &'static str,
    model: Box<dyn Any + Send + Sync>,
}

/// Registry of model accessors keyed by their (usually `dyn Trait`) type
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<TypeId, Entry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accessor, replacing any earlier registration of `M`.
    pub fn register<M>(&self, model: Arc<M>)
    where
        M: ?Sized + Model,
    {
        let name = M::NAME;
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = models
            .insert(
                TypeId::of::<Arc<M>>(),
                Entry {
                    name,
                    model: Box::new(model),
                },
            )
            .is_some();
        debug!(model = name, replaced, "registered model");
    }

    /// Look up the accessor registered for `M`.
    pub fn resolve<M>(&self) -> Option<Arc<M>>
    where
        M: ?Sized + Model,
    {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models
            .get(&TypeId::of::<Arc<M>>())
            .and_then(|entry| entry.model.downcast_ref::<Arc<M>>())
            .cloned()
    }

    /// Like [`resolve`](Self::resolve), failing with `ModelNotRegistered`
    /// carrying `M::NAME`.
    pub fn require<M>(&self) -> Result<Arc<M>, DbError>
    where
        M: ?Sized + Model,
    {
        self.resolve::<M>().ok_or(DbError::ModelNotRegistered(M::NAME))
    }

    pub fn contains<M>(&self) -> bool
    where
        M: ?Sized + Model,
    {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.contains_key(&TypeId::of::<Arc<M>>())
    }

    /// Names of all registered models, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = models.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: std::fmt::Debug + Send + Sync {
        fn greet(&self) -> String;
    }

    impl Model for dyn Greeter {
        const NAME: &'static str = "greeter";
    }

    #[derive(Debug)]
    struct English;
    impl Model for English {
        const NAME: &'static str = "english";
    }
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[derive(Debug)]
    struct Norwegian;
    impl Greeter for Norwegian {
        fn greet(&self) -> String {
            "hei".into()
        }
    }

    #[test]
    fn resolves_trait_objects() {
        let registry = ModelRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English));

        let greeter = registry.resolve::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(registry.contains::<dyn Greeter>());
    }

    #[test]
    fn missing_model_is_reported_by_its_registered_name() {
        let registry = ModelRegistry::new();
        assert!(registry.resolve::<dyn Greeter>().is_none());

        let err = registry.require::<dyn Greeter>().unwrap_err();
        assert!(matches!(err, DbError::ModelNotRegistered("greeter")));

        registry.register::<dyn Greeter>(Arc::new(English));
        assert_eq!(registry.names(), vec![<dyn Greeter as Model>::NAME]);
    }

    #[test]
    fn later_registration_wins() {
        let registry = ModelRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English));
        registry.register::<dyn Greeter>(Arc::new(Norwegian));

        assert_eq!(registry.resolve::<dyn Greeter>().unwrap().greet(), "hei");
        assert_eq!(registry.names(), vec!["greeter"]);
    }

    #[test]
    fn concrete_and_trait_registrations_are_distinct() {
        let registry = ModelRegistry::new();
        registry.register::<English>(Arc::new(English));

        assert!(registry.resolve::<dyn Greeter>().is_none());
        assert!(registry.resolve::<English>().is_some());
    }
}
