//! World wrapper providing lifecycle hooks on top of hecs
//!
//! hecs stores components but has no notion of construct/update/destroy
//! callbacks. The wrapper routes every mutation of a *tracked* component type
//! (one with at least one registered hook) through its hooks, synchronously,
//! before the triggering call returns.
//!
//! A type can also be *protected*: it is then only changed by inserting or
//! removing it, never mutated in place through the wrapper. Hierarchy
//! records are protected while a scene is connected, since rewriting one
//! would bypass the link table.

use super::error::HierarchyError;
use hecs::Entity;
use std::any::{type_name, TypeId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Callback invoked with the raw store and the entity whose component changed
pub type LifecycleHook =
    Box<dyn Fn(&mut hecs::World, Entity) -> Result<(), HierarchyError> + Send + Sync>;

/// Handle of a registered hook, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Component lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Fired after the component was added
    Construct,
    /// Fired after the component was modified through [`World::update`]
    Update,
    /// Fired before the component is removed, either directly or by despawn
    Destroy,
}

struct ComponentHooks {
    name: &'static str,
    present: fn(&hecs::World, Entity) -> bool,
    on_construct: Vec<(HookId, LifecycleHook)>,
    on_update: Vec<(HookId, LifecycleHook)>,
    on_destroy: Vec<(HookId, LifecycleHook)>,
}

impl ComponentHooks {
    fn new<T: hecs::Component>() -> Self {
        Self {
            name: type_name::<T>(),
            present: has_component::<T>,
            on_construct: Vec::new(),
            on_update: Vec::new(),
            on_destroy: Vec::new(),
        }
    }

    fn for_event(&self, event: LifecycleEvent) -> &[(HookId, LifecycleHook)] {
        match event {
            LifecycleEvent::Construct => &self.on_construct,
            LifecycleEvent::Update => &self.on_update,
            LifecycleEvent::Destroy => &self.on_destroy,
        }
    }

    fn for_event_mut(&mut self, event: LifecycleEvent) -> &mut Vec<(HookId, LifecycleHook)> {
        match event {
            LifecycleEvent::Construct => &mut self.on_construct,
            LifecycleEvent::Update => &mut self.on_update,
            LifecycleEvent::Destroy => &mut self.on_destroy,
        }
    }

    /// Drop the hook with `id`. Returns whether it was registered here.
    fn remove(&mut self, id: HookId) -> bool {
        let mut removed = false;
        for list in [&mut self.on_construct, &mut self.on_update, &mut self.on_destroy] {
            let before = list.len();
            list.retain(|(hook_id, _)| *hook_id != id);
            removed |= list.len() != before;
        }
        removed
    }

    fn is_empty(&self) -> bool {
        self.on_construct.is_empty() && self.on_update.is_empty() && self.on_destroy.is_empty()
    }
}

fn has_component<T: hecs::Component>(world: &hecs::World, entity: Entity) -> bool {
    world
        .entity(entity)
        .map(|entity_ref| entity_ref.has::<T>())
        .unwrap_or(false)
}

fn query_error<T: hecs::Component>(entity: Entity, error: hecs::QueryOneError) -> HierarchyError {
    match error {
        hecs::QueryOneError::NoSuchEntity => HierarchyError::NoSuchEntity(entity),
        hecs::QueryOneError::Unsatisfied => HierarchyError::MissingComponent {
            entity,
            component: type_name::<T>(),
        },
    }
}

fn component_error<T: hecs::Component>(entity: Entity, error: hecs::ComponentError) -> HierarchyError {
    match error {
        hecs::ComponentError::NoSuchEntity => HierarchyError::NoSuchEntity(entity),
        hecs::ComponentError::MissingComponent(_) => HierarchyError::MissingComponent {
            entity,
            component: type_name::<T>(),
        },
    }
}

/// Wrapper around hecs::World adding per-component lifecycle hooks
pub struct World {
    inner: hecs::World,
    hooks: HashMap<TypeId, ComponentHooks>,
    protected: HashSet<TypeId>,
    next_hook: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
            hooks: HashMap::new(),
            protected: HashSet::new(),
            next_hook: 0,
        }
    }

    /// Register a hook fired after a `T` component is added to an entity
    ///
    /// A failing construct hook rolls the insertion back, so hooks must
    /// validate before they write.
    pub fn on_construct<T: hecs::Component>(
        &mut self,
        hook: impl Fn(&mut hecs::World, Entity) -> Result<(), HierarchyError> + Send + Sync + 'static,
    ) -> HookId {
        self.register::<T>(LifecycleEvent::Construct, Box::new(hook))
    }

    /// Register a hook fired after a `T` component is modified through [`World::update`]
    pub fn on_update<T: hecs::Component>(
        &mut self,
        hook: impl Fn(&mut hecs::World, Entity) -> Result<(), HierarchyError> + Send + Sync + 'static,
    ) -> HookId {
        self.register::<T>(LifecycleEvent::Update, Box::new(hook))
    }

    /// Register a hook fired before a `T` component is removed or its entity despawned
    pub fn on_destroy<T: hecs::Component>(
        &mut self,
        hook: impl Fn(&mut hecs::World, Entity) -> Result<(), HierarchyError> + Send + Sync + 'static,
    ) -> HookId {
        self.register::<T>(LifecycleEvent::Destroy, Box::new(hook))
    }

    fn register<T: hecs::Component>(&mut self, event: LifecycleEvent, hook: LifecycleHook) -> HookId {
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        self.hooks
            .entry(TypeId::of::<T>())
            .or_insert_with(ComponentHooks::new::<T>)
            .for_event_mut(event)
            .push((id, hook));
        trace!(component = type_name::<T>(), event = ?event, hook = ?id, "Registered lifecycle hook");
        id
    }

    /// Remove a single hook. A type left without hooks is no longer tracked.
    pub fn remove_hook(&mut self, id: HookId) -> bool {
        let Some(type_id) = self
            .hooks
            .iter_mut()
            .find_map(|(type_id, hooks)| hooks.remove(id).then_some(*type_id))
        else {
            return false;
        };
        if self.hooks.get(&type_id).is_some_and(ComponentHooks::is_empty) {
            self.hooks.remove(&type_id);
        }
        true
    }

    /// Drop every hook registered for `T`. Returns whether any were registered.
    pub fn clear_hooks<T: hecs::Component>(&mut self) -> bool {
        let removed = self.hooks.remove(&TypeId::of::<T>()).is_some();
        if removed {
            debug!(component = type_name::<T>(), "Cleared lifecycle hooks");
        }
        removed
    }

    /// Whether `T` has lifecycle hooks registered
    pub fn is_tracked<T: hecs::Component>(&self) -> bool {
        self.hooks.contains_key(&TypeId::of::<T>())
    }

    /// Forbid in-place mutation of `T` through [`World::update`] and [`World::get_mut`]
    pub fn protect<T: hecs::Component>(&mut self) {
        if self.protected.insert(TypeId::of::<T>()) {
            debug!(component = type_name::<T>(), "Protected component");
        }
    }

    /// Lift the protection of `T`. Returns whether it was protected.
    pub fn unprotect<T: hecs::Component>(&mut self) -> bool {
        self.protected.remove(&TypeId::of::<T>())
    }

    pub fn is_protected<T: hecs::Component>(&self) -> bool {
        self.protected.contains(&TypeId::of::<T>())
    }

    fn check_unprotected<T: hecs::Component>(&self, entity: Entity) -> Result<(), HierarchyError> {
        if self.is_protected::<T>() {
            return Err(HierarchyError::ProtectedComponent {
                entity,
                component: type_name::<T>(),
            });
        }
        Ok(())
    }

    fn fire(
        &mut self,
        type_id: TypeId,
        event: LifecycleEvent,
        entity: Entity,
    ) -> Result<(), HierarchyError> {
        let Some(hooks) = self.hooks.get(&type_id) else {
            return Ok(());
        };
        trace!(entity = ?entity, component = hooks.name, event = ?event, "Firing lifecycle hooks");
        for (_, hook) in hooks.for_event(event) {
            hook(&mut self.inner, entity)?;
        }
        Ok(())
    }

    /// Tracked component types currently present on `entity`
    fn tracked_on(&self, entity: Entity) -> Vec<TypeId> {
        self.hooks
            .iter()
            .filter(|(_, hooks)| (hooks.present)(&self.inner, entity))
            .map(|(type_id, _)| *type_id)
            .collect()
    }

    /// Spawn a new entity with the given components
    ///
    /// Construct hooks fire for every tracked component in the bundle. If one
    /// of them fails, hooks of the components already constructed are undone
    /// and the entity is removed again.
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Result<Entity, HierarchyError> {
        let entity = self.inner.spawn(components);

        let mut constructed = Vec::new();
        for type_id in self.tracked_on(entity) {
            if let Err(err) = self.fire(type_id, LifecycleEvent::Construct, entity) {
                for done in constructed.into_iter().rev() {
                    self.fire(done, LifecycleEvent::Destroy, entity)?;
                }
                let _ = self.inner.despawn(entity);
                debug!(entity = ?entity, error = %err, "Rolled back spawn");
                return Err(err);
            }
            constructed.push(type_id);
        }

        Ok(entity)
    }

    /// Despawn an entity and all its components, firing destroy hooks first
    pub fn despawn(&mut self, entity: Entity) -> Result<(), HierarchyError> {
        if !self.inner.contains(entity) {
            return Err(HierarchyError::NoSuchEntity(entity));
        }
        for type_id in self.tracked_on(entity) {
            self.fire(type_id, LifecycleEvent::Destroy, entity)?;
        }
        self.inner
            .despawn(entity)
            .map_err(|_| HierarchyError::NoSuchEntity(entity))
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert a component into an entity
    ///
    /// Untracked components are inserted or replaced as in hecs. A tracked
    /// component cannot be replaced wholesale: inserting it twice yields
    /// [`HierarchyError::AlreadyLinked`] and leaves the entity untouched.
    pub fn insert_one<T: hecs::Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), HierarchyError> {
        if !self.inner.contains(entity) {
            return Err(HierarchyError::NoSuchEntity(entity));
        }

        let type_id = TypeId::of::<T>();
        if !self.hooks.contains_key(&type_id) {
            return self
                .inner
                .insert_one(entity, component)
                .map_err(|_| HierarchyError::NoSuchEntity(entity));
        }

        if has_component::<T>(&self.inner, entity) {
            return Err(HierarchyError::AlreadyLinked(entity));
        }

        self.inner
            .insert_one(entity, component)
            .map_err(|_| HierarchyError::NoSuchEntity(entity))?;

        if let Err(err) = self.fire(type_id, LifecycleEvent::Construct, entity) {
            let _ = self.inner.remove_one::<T>(entity);
            debug!(entity = ?entity, component = type_name::<T>(), error = %err, "Rolled back insert");
            return Err(err);
        }
        Ok(())
    }

    /// Remove a component from an entity, firing destroy hooks first
    pub fn remove_one<T: hecs::Component>(&mut self, entity: Entity) -> Result<T, HierarchyError> {
        if !has_component::<T>(&self.inner, entity) {
            return Err(if self.inner.contains(entity) {
                HierarchyError::MissingComponent {
                    entity,
                    component: type_name::<T>(),
                }
            } else {
                HierarchyError::NoSuchEntity(entity)
            });
        }

        self.fire(TypeId::of::<T>(), LifecycleEvent::Destroy, entity)?;
        self.inner
            .remove_one::<T>(entity)
            .map_err(|err| component_error::<T>(entity, err))
    }

    /// Modify a component in place and fire its update hooks
    ///
    /// Protected components are rejected with [`HierarchyError::ProtectedComponent`].
    pub fn update<T: hecs::Component, R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, HierarchyError> {
        self.check_unprotected::<T>(entity)?;
        let result = {
            let mut component = self
                .inner
                .get::<&mut T>(entity)
                .map_err(|err| component_error::<T>(entity, err))?;
            f(&mut component)
        };
        self.fire(TypeId::of::<T>(), LifecycleEvent::Update, entity)?;
        Ok(result)
    }

    /// Get a reference to a component on an entity
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Check whether an entity has a component
    pub fn has<T: hecs::Component>(&self, entity: Entity) -> bool {
        has_component::<T>(&self.inner, entity)
    }

    /// Every entity owning a `T` component
    pub fn view<T: hecs::Component>(&self) -> Vec<Entity> {
        self.inner
            .query::<()>()
            .with::<&T>()
            .iter()
            .map(|(entity, ())| entity)
            .collect()
    }

    /// Mutable reference to an unprotected component. No hooks fire.
    pub fn get_mut<T: hecs::Component>(&mut self, entity: Entity) -> Result<&mut T, HierarchyError> {
        self.check_unprotected::<T>(entity)?;
        self.inner
            .query_one_mut::<&mut T>(entity)
            .map_err(|err| query_error::<T>(entity, err))
    }

    /// Raw store; hecs allows mutable borrows through `&World`, so it stays inside the crate
    pub(crate) fn inner(&self) -> &hecs::World {
        &self.inner
    }

    /// Mutable access bypasses the hooks, so it stays inside the crate
    pub(crate) fn inner_mut(&mut self) -> &mut hecs::World {
        &mut self.inner
    }
}
