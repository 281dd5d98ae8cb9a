//! Kind templates and the immutable template registry.
//!
//! A kind template holds every default a piece of that kind starts with.
//! Templates are assembled with [`KindTemplate::builder`] and validated once
//! by [`TemplateRegistry::build`], which also resolves the food, threat and
//! mate name lists into id tables. Nothing in the registry changes after
//! construction, so the engine can share it behind an `Arc`.
//!
//! ```
//! use wildsim_core::components::Category;
//! use wildsim_core::templates::{KindTemplate, TemplateRegistry};
//!
//! let registry = TemplateRegistry::build(vec![
//!     KindTemplate::builder("clover", Category::Plant).max_hit_points(5.0).build(),
//!     KindTemplate::builder("hare", Category::Animal).eats(&["clover"]).build(),
//! ])
//! .unwrap();
//! let hare = registry.id_of("hare").unwrap();
//! let clover = registry.id_of("clover").unwrap();
//! assert!(registry.eats(hare, clover));
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{Category, KindId, Vitals};

/// Errors found while validating kind templates.
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("kind `{0}` is defined more than once")]
    DuplicateName(String),
    #[error("kind `{kind}` references unknown kind `{referenced}`")]
    UnknownKind { kind: String, referenced: String },
    #[error("kind `{kind}` has non-positive `{field}`")]
    NonPositive { kind: String, field: &'static str },
    #[error("kind `{kind}` has a negative `{field}`")]
    Negative { kind: String, field: &'static str },
    #[error("too many kinds: {0}")]
    TooManyKinds(usize),
    #[error("failed to parse templates: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Every default for one kind of piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindTemplate {
    pub name: String,
    pub category: Category,

    // Vitals
    pub mass: f32,
    pub max_hit_points: f32,
    pub max_stamina: f32,
    pub max_fed: f32,
    /// Ticks before dying of old age; zero means ageless
    pub max_age: u32,
    pub strength: f32,
    /// Board units per tick under its own power
    pub speed: f32,

    // Environment
    /// Multiplier on heat gains; zero never heats up
    pub fire_affinity: f32,
    /// Moves when pushed by impulses
    pub pushable: bool,
    /// Spins when pushed
    pub tumbles: bool,
    pub blocks_movement: bool,

    // Senses and behavior
    pub awareness: f32,
    /// Sight radius
    pub perception: f32,
    /// Distance at which it can bite, hit or mate
    pub reach: f32,
    /// Calls same-kind neighbours for help when attacked
    pub social: bool,
    /// Melee damage, or impact damage for projectiles
    pub damage: f32,
    /// How well it digests what it eats
    pub digestion: f32,
    /// Energy per unit eaten when this kind is food
    pub nutrition: f32,
    pub gestation_ticks: u32,

    // Lifecycle
    /// Ticks a corpse lingers after being killed
    pub decay_ticks: u32,

    // Plants
    pub regrowth: f32,
    pub seed_interval: u32,
    pub seed_radius: f32,
    /// Seeding stops once this many same-kind plants are within the seed radius
    pub crowding_limit: usize,

    // Fire
    /// Fuel consumed per tick
    pub fuel_burn: f32,

    // Projectiles
    /// Ticks of flight
    pub range: u16,

    // Contents
    /// Inventory slots; zero means no inventory
    pub capacity: usize,
    pub food: Vec<String>,
    pub threats: Vec<String>,
    pub mates: Vec<String>,
    /// Items the piece carries when spawned
    pub carries: Vec<String>,
}

impl Default for KindTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            category: Category::Item,
            mass: 1.0,
            max_hit_points: 10.0,
            max_stamina: 0.0,
            max_fed: 0.0,
            max_age: 0,
            strength: 1.0,
            speed: 1.0,
            fire_affinity: 0.0,
            pushable: true,
            tumbles: false,
            blocks_movement: false,
            awareness: 1.0,
            perception: 0.0,
            reach: 8.0,
            social: false,
            damage: 0.0,
            digestion: 1.0,
            nutrition: 1.0,
            gestation_ticks: 0,
            decay_ticks: 600,
            regrowth: 0.0,
            seed_interval: 0,
            seed_radius: 0.0,
            crowding_limit: 0,
            fuel_burn: 0.0,
            range: 0,
            capacity: 0,
            food: Vec::new(),
            threats: Vec::new(),
            mates: Vec::new(),
            carries: Vec::new(),
        }
    }
}

impl KindTemplate {
    pub fn builder(name: &str, category: Category) -> KindTemplateBuilder {
        KindTemplateBuilder::new(name, category)
    }

    /// Vitals a freshly spawned piece of this kind starts with.
    pub fn vitals(&self) -> Vitals {
        let mut vitals = Vitals::new(self.mass, self.max_hit_points, self.max_stamina, self.max_fed);
        vitals.max_age = self.max_age;
        vitals.strength = self.strength;
        vitals.speed = self.speed;
        vitals
    }

    fn validate(&self) -> Result<(), TemplateError> {
        let positive = [
            ("mass", self.mass),
            ("max_hit_points", self.max_hit_points),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(TemplateError::NonPositive {
                    kind: self.name.clone(),
                    field,
                });
            }
        }
        let non_negative = [
            ("fire_affinity", self.fire_affinity),
            ("speed", self.speed),
            ("perception", self.perception),
            ("reach", self.reach),
            ("max_stamina", self.max_stamina),
            ("max_fed", self.max_fed),
            ("regrowth", self.regrowth),
            ("fuel_burn", self.fuel_burn),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(TemplateError::Negative {
                    kind: self.name.clone(),
                    field,
                });
            }
        }
        match self.category {
            Category::Animal | Category::Player if self.max_fed <= 0.0 => {
                Err(TemplateError::NonPositive {
                    kind: self.name.clone(),
                    field: "max_fed",
                })
            }
            Category::Projectile if self.range == 0 => Err(TemplateError::NonPositive {
                kind: self.name.clone(),
                field: "range",
            }),
            _ => Ok(()),
        }
    }
}

/// Named-setter builder for [`KindTemplate`], seeded with category defaults.
#[derive(Debug, Clone)]
pub struct KindTemplateBuilder {
    template: KindTemplate,
}

macro_rules! setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, value: $ty) -> Self {
                self.template.$field = value;
                self
            }
        )*
    };
}

impl KindTemplateBuilder {
    fn new(name: &str, category: Category) -> Self {
        let mut template = KindTemplate {
            name: name.to_string(),
            category,
            ..Default::default()
        };
        match category {
            Category::Animal | Category::Player => {
                template.max_stamina = 10.0;
                template.max_fed = 20.0;
                template.fire_affinity = 1.0;
                template.perception = 200.0;
                template.tumbles = true;
                template.damage = 5.0;
            }
            Category::Plant => {
                template.fire_affinity = 1.0;
                template.pushable = false;
                template.regrowth = 0.05;
                template.seed_interval = 600;
                template.seed_radius = 24.0;
                template.crowding_limit = 4;
                template.decay_ticks = 120;
            }
            Category::Fire => {
                template.pushable = false;
                template.max_hit_points = 100.0;
                template.fuel_burn = 0.1;
            }
            Category::Structure => {
                template.pushable = false;
                template.blocks_movement = true;
                template.fire_affinity = 0.5;
            }
            Category::Projectile => {
                template.range = 30;
                template.damage = 10.0;
            }
            Category::Item => {
                template.tumbles = true;
            }
        }
        Self { template }
    }

    setters! {
        mass: f32,
        max_hit_points: f32,
        max_stamina: f32,
        max_fed: f32,
        max_age: u32,
        strength: f32,
        speed: f32,
        fire_affinity: f32,
        pushable: bool,
        tumbles: bool,
        blocks_movement: bool,
        awareness: f32,
        perception: f32,
        reach: f32,
        social: bool,
        damage: f32,
        digestion: f32,
        nutrition: f32,
        gestation_ticks: u32,
        decay_ticks: u32,
        regrowth: f32,
        seed_interval: u32,
        seed_radius: f32,
        crowding_limit: usize,
        fuel_burn: f32,
        range: u16,
        capacity: usize,
    }

    pub fn eats(mut self, kinds: &[&str]) -> Self {
        self.template.food = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn fears(mut self, kinds: &[&str]) -> Self {
        self.template.threats = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn mates_with(mut self, kinds: &[&str]) -> Self {
        self.template.mates = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn carries(mut self, kinds: &[&str]) -> Self {
        self.template.carries = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn build(self) -> KindTemplate {
        self.template
    }
}

/// Validated, immutable collection of kind templates.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    kinds: Vec<KindTemplate>,
    by_name: HashMap<String, KindId>,
    food: Vec<Vec<KindId>>,
    threats: Vec<Vec<KindId>>,
    mates: Vec<Vec<KindId>>,
    carries: Vec<Vec<KindId>>,
}

#[derive(Deserialize)]
struct TemplateFile {
    #[serde(default)]
    kind: Vec<KindTemplate>,
}

impl TemplateRegistry {
    /// Validate templates and resolve every cross-kind reference.
    pub fn build(kinds: Vec<KindTemplate>) -> Result<Self, TemplateError> {
        if kinds.len() > usize::from(u16::MAX) {
            return Err(TemplateError::TooManyKinds(kinds.len()));
        }

        let mut by_name = HashMap::with_capacity(kinds.len());
        for (index, kind) in kinds.iter().enumerate() {
            kind.validate()?;
            if by_name.insert(kind.name.clone(), KindId(index as u16)).is_some() {
                return Err(TemplateError::DuplicateName(kind.name.clone()));
            }
        }

        let resolve = |kind: &KindTemplate, names: &[String]| -> Result<Vec<KindId>, TemplateError> {
            names
                .iter()
                .map(|name| {
                    by_name.get(name).copied().ok_or_else(|| TemplateError::UnknownKind {
                        kind: kind.name.clone(),
                        referenced: name.clone(),
                    })
                })
                .collect()
        };

        let mut food = Vec::with_capacity(kinds.len());
        let mut threats = Vec::with_capacity(kinds.len());
        let mut mates = Vec::with_capacity(kinds.len());
        let mut carries = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            food.push(resolve(kind, &kind.food)?);
            threats.push(resolve(kind, &kind.threats)?);
            mates.push(resolve(kind, &kind.mates)?);
            carries.push(resolve(kind, &kind.carries)?);
        }

        Ok(Self {
            kinds,
            by_name,
            food,
            threats,
            mates,
            carries,
        })
    }

    /// Parse `[[kind]]` tables from TOML and build a registry from them.
    pub fn from_toml_str(text: &str) -> Result<Self, TemplateError> {
        let file: TemplateFile = toml::from_str(text)?;
        Self::build(file.kind)
    }

    /// The default meadow content.
    pub fn standard() -> Self {
        match Self::build(standard_kinds()) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::error!(%err, "standard templates are invalid");
                panic!("standard templates are invalid: {err}");
            }
        }
    }

    /// Template for a kind id minted by this registry.
    pub fn get(&self, kind: KindId) -> &KindTemplate {
        &self.kinds[usize::from(kind.0)]
    }

    pub fn id_of(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, kind: KindId) -> &str {
        &self.get(kind).name
    }

    pub fn food_of(&self, kind: KindId) -> &[KindId] {
        &self.food[usize::from(kind.0)]
    }

    pub fn threats_of(&self, kind: KindId) -> &[KindId] {
        &self.threats[usize::from(kind.0)]
    }

    pub fn mates_of(&self, kind: KindId) -> &[KindId] {
        &self.mates[usize::from(kind.0)]
    }

    pub fn carried_by(&self, kind: KindId) -> &[KindId] {
        &self.carries[usize::from(kind.0)]
    }

    pub fn eats(&self, eater: KindId, food: KindId) -> bool {
        self.food_of(eater).contains(&food)
    }

    pub fn fears(&self, kind: KindId, other: KindId) -> bool {
        self.threats_of(kind).contains(&other)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KindId, &KindTemplate)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| (KindId(index as u16), kind))
    }
}

fn standard_kinds() -> Vec<KindTemplate> {
    vec![
        KindTemplate::builder("rabbit", Category::Animal)
            .mass(4.0)
            .max_hit_points(30.0)
            .max_age(36_000)
            .speed(4.0)
            .awareness(2.0)
            .perception(300.0)
            .damage(2.0)
            .nutrition(3.0)
            .gestation_ticks(200)
            .eats(&["grass", "bush", "berries"])
            .fears(&["wolf", "player"])
            .mates_with(&["rabbit"])
            .carries(&["meat"])
            .capacity(2)
            .build(),
        KindTemplate::builder("deer", Category::Animal)
            .mass(60.0)
            .max_hit_points(120.0)
            .max_stamina(30.0)
            .max_fed(60.0)
            .max_age(72_000)
            .speed(5.0)
            .perception(300.0)
            .damage(8.0)
            .social(true)
            .nutrition(4.0)
            .gestation_ticks(400)
            .eats(&["grass", "bush"])
            .fears(&["wolf", "player"])
            .mates_with(&["deer"])
            .carries(&["meat", "meat"])
            .capacity(4)
            .build(),
        KindTemplate::builder("wolf", Category::Animal)
            .mass(35.0)
            .max_hit_points(90.0)
            .max_stamina(25.0)
            .max_fed(50.0)
            .max_age(60_000)
            .strength(2.0)
            .speed(6.0)
            .awareness(0.5)
            .perception(350.0)
            .damage(12.0)
            .social(true)
            .gestation_ticks(500)
            .eats(&["rabbit", "deer", "meat"])
            .fears(&["player"])
            .mates_with(&["wolf"])
            .build(),
        KindTemplate::builder("grass", Category::Plant)
            .mass(0.5)
            .max_hit_points(8.0)
            .nutrition(1.5)
            .build(),
        KindTemplate::builder("bush", Category::Plant)
            .mass(6.0)
            .max_hit_points(25.0)
            .regrowth(0.02)
            .seed_interval(1_200)
            .seed_radius(40.0)
            .crowding_limit(3)
            .nutrition(2.0)
            .carries(&["berries"])
            .capacity(3)
            .build(),
        KindTemplate::builder("tree", Category::Plant)
            .mass(400.0)
            .max_hit_points(300.0)
            .fire_affinity(0.4)
            .blocks_movement(true)
            .regrowth(0.01)
            .seed_interval(6_000)
            .seed_radius(80.0)
            .crowding_limit(2)
            .decay_ticks(1_200)
            .carries(&["wood", "wood"])
            .capacity(4)
            .build(),
        KindTemplate::builder("campfire", Category::Fire)
            .mass(20.0)
            .max_hit_points(200.0)
            .fuel_burn(0.05)
            .blocks_movement(true)
            .build(),
        KindTemplate::builder("flame", Category::Fire)
            .mass(2.0)
            .max_hit_points(30.0)
            .fuel_burn(0.2)
            .build(),
        KindTemplate::builder("hut", Category::Structure)
            .mass(500.0)
            .max_hit_points(400.0)
            .build(),
        KindTemplate::builder("chest", Category::Structure)
            .mass(30.0)
            .max_hit_points(80.0)
            .blocks_movement(false)
            .capacity(12)
            .build(),
        KindTemplate::builder("player", Category::Player)
            .mass(70.0)
            .max_hit_points(100.0)
            .max_stamina(40.0)
            .max_fed(80.0)
            .speed(5.0)
            .perception(400.0)
            .damage(10.0)
            .eats(&["berries", "meat"])
            .carries(&["spear", "spear", "wood"])
            .capacity(16)
            .build(),
        KindTemplate::builder("spear", Category::Projectile)
            .mass(2.0)
            .max_hit_points(20.0)
            .speed(12.0)
            .damage(25.0)
            .range(25)
            .reach(6.0)
            .build(),
        KindTemplate::builder("meat", Category::Item)
            .mass(1.0)
            .nutrition(6.0)
            .decay_ticks(1_800)
            .fire_affinity(0.2)
            .build(),
        KindTemplate::builder("berries", Category::Item)
            .mass(0.2)
            .nutrition(3.0)
            .build(),
        KindTemplate::builder("wood", Category::Item)
            .mass(2.0)
            .fire_affinity(1.0)
            .nutrition(40.0)
            .build(),
    ]
}
