//! Constructor identity: service classes and their pointer-keyed handles.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use alloy_domain::{Error, Result};

/// A resolved service instance (or token value).
pub type Instance = Arc<dyn Any + Send + Sync>;

type ConstructFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance> + Send + Sync>;

/// A service class: the runtime's stand-in for a constructor value.
///
/// Identity is the `Arc` pointer, so two classes with the same name are
/// still distinct services — exactly like two identically named classes
/// from different modules.
pub struct ServiceClass {
    name: String,
    construct: ConstructFn,
    placeholder: bool,
    provider_placeholder: bool,
    methods: Vec<String>,
}

/// Shared handle to a service class.
pub type ServiceCtor = Arc<ServiceClass>;

impl ServiceClass {
    /// Start building a class
    pub fn builder(name: impl Into<String>) -> ServiceClassBuilder {
        ServiceClassBuilder {
            name: name.into(),
            construct: None,
            placeholder: false,
            provider_placeholder: false,
            methods: Vec::new(),
        }
    }

    /// Declared class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method surface mirrored by auto-mocks
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Whether this is a deferred-service placeholder
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Whether this placeholder was declared by a provider block
    /// (suppresses the factory-path warning)
    pub fn is_provider_placeholder(&self) -> bool {
        self.provider_placeholder
    }

    /// Invoke the constructor with resolved dependency values.
    ///
    /// Placeholders refuse direct construction; their real class arrives
    /// through the factory descriptor instead.
    pub fn construct(&self, dependencies: Vec<Instance>) -> Result<Instance> {
        if self.placeholder {
            return Err(Error::placeholder_instantiated(&self.name));
        }
        (self.construct)(dependencies)
    }
}

impl fmt::Debug for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClass")
            .field("name", &self.name)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ServiceClass`].
pub struct ServiceClassBuilder {
    name: String,
    construct: Option<ConstructFn>,
    placeholder: bool,
    provider_placeholder: bool,
    methods: Vec<String>,
}

impl ServiceClassBuilder {
    /// Set the constructor body
    pub fn construct<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Result<Instance> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(f));
        self
    }

    /// Declare the method surface mirrored by auto-mocks
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the class as a deferred-service placeholder
    pub fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    /// Mark the class as a provider-declared placeholder
    pub fn provider_placeholder(mut self) -> Self {
        self.placeholder = true;
        self.provider_placeholder = true;
        self
    }

    /// Finish, producing the shared handle
    pub fn build(self) -> ServiceCtor {
        let name = self.name;
        let construct = self.construct.unwrap_or_else(|| {
            let class_name = name.clone();
            Arc::new(move |_deps| {
                Err(Error::construction(
                    &class_name,
                    "class has no constructor body",
                ))
            })
        });
        Arc::new(ServiceClass {
            name,
            construct,
            placeholder: self.placeholder,
            provider_placeholder: self.provider_placeholder,
            methods: self.methods,
        })
    }
}

/// Pointer-identity key for a service class; usable in hash maps.
#[derive(Clone)]
pub struct CtorKey(ServiceCtor);

impl CtorKey {
    /// Wrap a constructor handle
    pub fn of(ctor: &ServiceCtor) -> Self {
        Self(Arc::clone(ctor))
    }

    /// The wrapped constructor
    pub fn ctor(&self) -> &ServiceCtor {
        &self.0
    }

    /// The class name, for diagnostics
    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl PartialEq for CtorKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CtorKey {}

impl Hash for CtorKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for CtorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CtorKey({})", self.0.name())
    }
}
