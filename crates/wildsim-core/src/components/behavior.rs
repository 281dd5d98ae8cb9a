//! Behavior state components.
//!
//! Every state variant carries exactly the working memory it needs (target,
//! countdowns, headings). Entering a new state means building a new variant,
//! so memory from an earlier decision can never leak into the next one, and
//! none of it is ever serialized: only the [`StateTag`] crosses the save
//! boundary.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::{Category, Point, Vec2};

/// Active state of a piece, grouped by the state machine that owns it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Not registered for ticking; woken by impulses, heat or damage
    Inactive,
    Animal(AnimalState),
    Plant(PlantState),
    Fire(FireState),
    Structure(StructureState),
    Player(PlayerState),
    Projectile(ProjectileState),
}

/// Why an animal is chasing something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChasePurpose {
    /// Reach food, then graze it or attack it
    Eat,
    Mate,
    /// Answering a call for help
    Defend,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimalState {
    /// Run the decision engine and pick what to do next
    Assess,
    WalkAround { heading: Vec2, steps_left: u16 },
    Rest { ticks_left: u16 },
    Chase { target: Entity, purpose: ChasePurpose, patience: u32 },
    Attack { target: Entity, cooldown: u16 },
    Eat { target: Entity },
    Mate { partner: Entity, ticks_left: u16 },
    GiveBirth { ticks_left: u16 },
    Flee { threat: Entity, ticks_left: u16 },
    FleeToWater { water: Point },
    CallForHelp { threat: Entity },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlantState {
    /// Regrowing biomass towards full health
    Growing,
    /// Fully grown; scatters seed when the cooldown runs out
    Seeding { cooldown: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireState {
    /// Consuming fuel (hit points) each tick
    Burning,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructureState {
    /// Weathering while damaged or heated; goes inactive once settled
    Standing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerState {
    /// Driven by queued player commands
    Controlled,
    /// Killed; waiting for game-over handling
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileState {
    Flying {
        velocity: Vec2,
        range_left: u16,
        thrower: Option<Entity>,
    },
    /// Finished flying; removed on its next tick
    Spent,
}

/// Flat, serializable name of an active state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateTag {
    Inactive,
    Assess,
    WalkAround,
    Rest,
    Chase,
    Attack,
    Eat,
    Mate,
    GiveBirth,
    Flee,
    FleeToWater,
    CallForHelp,
    Growing,
    Seeding,
    Burning,
    Standing,
    Controlled,
    Dead,
    Flying,
    Spent,
}

impl Behavior {
    pub fn tag(&self) -> StateTag {
        match self {
            Behavior::Inactive => StateTag::Inactive,
            Behavior::Animal(state) => match state {
                AnimalState::Assess => StateTag::Assess,
                AnimalState::WalkAround { .. } => StateTag::WalkAround,
                AnimalState::Rest { .. } => StateTag::Rest,
                AnimalState::Chase { .. } => StateTag::Chase,
                AnimalState::Attack { .. } => StateTag::Attack,
                AnimalState::Eat { .. } => StateTag::Eat,
                AnimalState::Mate { .. } => StateTag::Mate,
                AnimalState::GiveBirth { .. } => StateTag::GiveBirth,
                AnimalState::Flee { .. } => StateTag::Flee,
                AnimalState::FleeToWater { .. } => StateTag::FleeToWater,
                AnimalState::CallForHelp { .. } => StateTag::CallForHelp,
            },
            Behavior::Plant(PlantState::Growing) => StateTag::Growing,
            Behavior::Plant(PlantState::Seeding { .. }) => StateTag::Seeding,
            Behavior::Fire(FireState::Burning) => StateTag::Burning,
            Behavior::Structure(StructureState::Standing) => StateTag::Standing,
            Behavior::Player(PlayerState::Controlled) => StateTag::Controlled,
            Behavior::Player(PlayerState::Dead) => StateTag::Dead,
            Behavior::Projectile(ProjectileState::Flying { .. }) => StateTag::Flying,
            Behavior::Projectile(ProjectileState::Spent) => StateTag::Spent,
        }
    }

    /// Initial state for a freshly spawned piece of a category.
    pub fn initial(category: Category) -> Self {
        match category {
            Category::Animal => Behavior::Animal(AnimalState::Assess),
            Category::Plant => Behavior::Plant(PlantState::Growing),
            Category::Fire => Behavior::Fire(FireState::Burning),
            Category::Structure => Behavior::Structure(StructureState::Standing),
            Category::Player => Behavior::Player(PlayerState::Controlled),
            Category::Projectile | Category::Item => Behavior::Inactive,
        }
    }

    /// Deterministic state to re-enter after loading a saved tag.
    ///
    /// States that depended on working memory cannot be resumed: animals
    /// always reassess, seeding plants restart their cooldown from zero and
    /// projectiles in flight drop to the ground.
    pub fn reentry(category: Category, tag: StateTag) -> Self {
        match (category, tag) {
            (_, StateTag::Inactive) if category != Category::Animal => Behavior::Inactive,
            (Category::Plant, StateTag::Seeding) => Behavior::Plant(PlantState::Seeding { cooldown: 0 }),
            (Category::Player, StateTag::Dead) => Behavior::Player(PlayerState::Dead),
            (Category::Projectile, StateTag::Spent) => Behavior::Projectile(ProjectileState::Spent),
            _ => Behavior::initial(category),
        }
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, Behavior::Inactive)
    }

    pub fn is_fleeing(&self) -> bool {
        matches!(
            self,
            Behavior::Animal(AnimalState::Flee { .. } | AnimalState::FleeToWater { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_states() {
        assert_eq!(Behavior::initial(Category::Animal).tag(), StateTag::Assess);
        assert_eq!(Behavior::initial(Category::Plant).tag(), StateTag::Growing);
        assert_eq!(Behavior::initial(Category::Item).tag(), StateTag::Inactive);
        assert_eq!(Behavior::initial(Category::Projectile).tag(), StateTag::Inactive);
    }

    #[test]
    fn test_animals_always_reassess_on_load() {
        for tag in [StateTag::Chase, StateTag::Flee, StateTag::Mate, StateTag::Inactive] {
            assert_eq!(Behavior::reentry(Category::Animal, tag).tag(), StateTag::Assess);
        }
    }

    #[test]
    fn test_reentry_keeps_memoryless_states() {
        assert_eq!(
            Behavior::reentry(Category::Structure, StateTag::Inactive),
            Behavior::Inactive
        );
        assert_eq!(
            Behavior::reentry(Category::Player, StateTag::Dead),
            Behavior::Player(PlayerState::Dead)
        );
        assert_eq!(
            Behavior::reentry(Category::Plant, StateTag::Seeding),
            Behavior::Plant(PlantState::Seeding { cooldown: 0 })
        );
        assert_eq!(
            Behavior::reentry(Category::Projectile, StateTag::Flying),
            Behavior::Inactive
        );
    }

    #[test]
    fn test_fleeing_flags() {
        let mut world = hecs::World::new();
        let wolf = world.spawn(());
        let fleeing = Behavior::Animal(AnimalState::Flee {
            threat: wolf,
            ticks_left: 3,
        });
        assert!(fleeing.is_fleeing());
        assert!(Behavior::Animal(AnimalState::FleeToWater { water: Point::ORIGIN }).is_fleeing());
        assert!(!Behavior::Animal(AnimalState::Assess).is_fleeing());
    }
}
