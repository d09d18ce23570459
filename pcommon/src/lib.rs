//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use pcommon::{GenerationOptions, SessionId, TenantId};
//!
//! let session = SessionId::from("session-1");
//! let tenant = TenantId::new("acme");
//!
//! let options = GenerationOptions::default().with_temperature(0.3);
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(tenant.to_string(), "acme");
//! assert_eq!(options.max_tokens, None);
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use pcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use pcommon::{SessionId, TurnId};
    //!
    //! let session = SessionId::new("session-42");
    //! let generated = TurnId::generate();
    //!
    //! assert_eq!(session.to_string(), "session-42");
    //! assert_eq!(generated.as_str().len(), 36);
    //! ```

    use std::fmt::{Display, Formatter};

    macro_rules! id_newtype {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                /// Creates a fresh random (v4 UUID) identifier.
                pub fn generate() -> Self {
                    Self(uuid::Uuid::new_v4().to_string())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    id_newtype!(
        /// Identifier of a persisted conversation session.
        SessionId
    );
    id_newtype!(
        /// Identifier of the tenant a session and its credentials belong to.
        TenantId
    );
    id_newtype!(
        /// Identifier of a user; owners of sessions and authors of user turns.
        UserId
    );
    id_newtype!(
        /// Identifier of a single persisted turn.
        TurnId
    );
}

pub mod time {
    //! Timestamp alias and helpers shared by stores and services.

    use chrono::{DateTime, TimeDelta, Utc};

    pub type Timestamp = DateTime<Utc>;

    pub fn now() -> Timestamp {
        Utc::now()
    }

    /// Returns a timestamp strictly later than `previous`, preferring the wall clock.
    ///
    /// ```rust
    /// use pcommon::time::{now, strictly_after};
    ///
    /// let last = now() + chrono::TimeDelta::seconds(60);
    /// assert!(strictly_after(Some(last)) > last);
    /// ```
    pub fn strictly_after(previous: Option<Timestamp>) -> Timestamp {
        let current = now();
        match previous {
            Some(previous) if current <= previous => previous + TimeDelta::microseconds(1),
            _ => current,
        }
    }
}

pub mod model {
    //! Sampling settings carried by completion requests. Unset values fall
    //! back to the serving backend's defaults.
    //!
    //! ```rust
    //! use pcommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }
    }
}

pub mod registry {
    //! Insertion-ordered registry map used by runtime registries.
    //!
    //! Iteration always follows registration order, so "first registered"
    //! lookups are deterministic.
    //!
    //! ```rust
    //! use pcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("beta".to_string(), 2_u32);
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert_eq!(registry.values().copied().collect::<Vec<_>>(), vec![2, 1]);
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        order: Vec<K>,
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                order: Vec::new(),
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash + Clone,
    {
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts or replaces a value. Replacing keeps the original position.
        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            let previous = self.items.insert(key.clone(), value);
            if previous.is_none() {
                self.order.push(key);
            }
            previous
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            let removed = self.items.remove(key)?;
            self.order
                .retain(|existing| <K as Borrow<Q>>::borrow(existing) != key);
            Some(removed)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
            self.order
                .iter()
                .filter_map(|key| self.items.get(key).map(|value| (key, value)))
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.iter().map(|(_, value)| value)
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use context::{SessionId, TenantId, TurnId, UserId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;
pub use time::Timestamp;
