use crate::core::{BorderCenter, UserId};
use crate::inventory::LiveInventory;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Bounded playable region of a world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldBorder {
    pub center: BorderCenter,
    pub size: f64,
    pub warning_distance: u32,
    pub warning_time_secs: u32,
    pub transition_time_secs: u64,
}

impl WorldBorder {
    pub fn contains(&self, position: &Position) -> bool {
        let half = self.size / 2.0;
        (position.x - self.center.x).abs() <= half && (position.z - self.center.z).abs() <= half
    }
}

/// Live-inventory access required by the transfer service.
pub trait InventoryHost: Send + 'static {
    fn inventory(&self, user: &UserId) -> Option<&LiveInventory>;
    fn inventory_mut(&mut self, user: &UserId) -> Option<&mut LiveInventory>;
}

/// World access required by the border applier.
pub trait WorldHost: Send + 'static {
    fn is_materialized(&self, world: &str) -> bool;
    fn border(&self, world: &str) -> Option<&WorldBorder>;
    /// Returns false when the world is not materialized.
    fn set_border(&mut self, world: &str, border: WorldBorder) -> bool;
    fn occupants(&self, world: &str) -> Vec<(UserId, Position)>;
    /// Fallback point for users pushed outside a border.
    fn safe_point(&self, world: &str) -> Option<Position>;
    fn relocate(&mut self, user: &UserId, world: &str, position: Position);
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub inventory: LiveInventory,
    pub world: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct WorldState {
    pub name: String,
    pub spawn: Position,
    pub border: Option<WorldBorder>,
    /// Number of border writes applied, for observing duplicate applications.
    pub border_writes: u64,
}

/// Reference host state: connected users and materialized worlds.
#[derive(Debug, Default)]
pub struct LiveState {
    users: HashMap<UserId, UserSession>,
    worlds: HashMap<String, WorldState>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_world(&mut self, name: impl Into<String>, spawn: Position) {
        let name = name.into();
        self.worlds.entry(name.clone()).or_insert(WorldState {
            name,
            spawn,
            border: None,
            border_writes: 0,
        });
    }

    pub fn unload_world(&mut self, name: &str) -> Option<WorldState> {
        self.worlds.remove(name)
    }

    pub fn world(&self, name: &str) -> Option<&WorldState> {
        self.worlds.get(name)
    }

    pub fn join(&mut self, user: UserId, world: impl Into<String>, position: Position) {
        self.users.insert(
            user,
            UserSession {
                inventory: LiveInventory::new(),
                world: world.into(),
                position,
            },
        );
    }

    pub fn leave(&mut self, user: &UserId) -> Option<UserSession> {
        self.users.remove(user)
    }

    pub fn session(&self, user: &UserId) -> Option<&UserSession> {
        self.users.get(user)
    }

    pub fn move_user(&mut self, user: &UserId, world: impl Into<String>, position: Position) {
        if let Some(session) = self.users.get_mut(user) {
            session.world = world.into();
            session.position = position;
        }
    }
}

impl InventoryHost for LiveState {
    fn inventory(&self, user: &UserId) -> Option<&LiveInventory> {
        self.users.get(user).map(|session| &session.inventory)
    }

    fn inventory_mut(&mut self, user: &UserId) -> Option<&mut LiveInventory> {
        self.users.get_mut(user).map(|session| &mut session.inventory)
    }
}

impl WorldHost for LiveState {
    fn is_materialized(&self, world: &str) -> bool {
        self.worlds.contains_key(world)
    }

    fn border(&self, world: &str) -> Option<&WorldBorder> {
        self.worlds.get(world).and_then(|state| state.border.as_ref())
    }

    fn set_border(&mut self, world: &str, border: WorldBorder) -> bool {
        match self.worlds.get_mut(world) {
            Some(state) => {
                state.border = Some(border);
                state.border_writes += 1;
                true
            }
            None => false,
        }
    }

    fn occupants(&self, world: &str) -> Vec<(UserId, Position)> {
        self.users
            .iter()
            .filter(|(_, session)| session.world == world)
            .map(|(user, session)| (*user, session.position))
            .collect()
    }

    fn safe_point(&self, world: &str) -> Option<Position> {
        let state = self.worlds.get(world)?;
        match &state.border {
            Some(border) if !border.contains(&state.spawn) => {
                Some(Position::new(border.center.x, state.spawn.y, border.center.z))
            }
            _ => Some(state.spawn),
        }
    }

    fn relocate(&mut self, user: &UserId, world: &str, position: Position) {
        self.move_user(user, world, position);
    }
}
