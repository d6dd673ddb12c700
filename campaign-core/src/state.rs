//! The campaign state graph.
//!
//! [`GameState`] is a plain value graph: cloning it yields a fully
//! independent copy with no shared interior references, which is the
//! sanctioned branching mechanism for speculative/batch simulation.
//! All mutation goes through [`crate::manager::GameStateManager`].

use crate::bounded::{new_morale, new_relation_value, BoundedInt};
use crate::grade::{Grade, OutcomeGrade};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub type CityId = String;
pub type GeneralId = String;
pub type FactionId = String;
pub type BattlefieldId = String;
pub type TacticId = String;
pub type EventId = String;

/// Campaign phase, a pure function of the turn counter
/// (see [`crate::turn::determine_phase`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Preparation,
    Battle,
    Aftermath,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Preparation => "preparation",
            Phase::Battle => "battle",
            Phase::Aftermath => "aftermath",
        };
        write!(f, "{s}")
    }
}

/// Physical condition of a general.
///
/// Transitions are one-directional toward the terminal states:
/// `Dead` is final, and `Captive` can only become `Dead`. A dead or
/// captive general is excluded from all future action eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneralCondition {
    Fit,
    Tired,
    Wounded,
    Captive,
    Dead,
}

impl GeneralCondition {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_become(self, next: GeneralCondition) -> bool {
        match self {
            GeneralCondition::Dead => false,
            GeneralCondition::Captive => next == GeneralCondition::Dead,
            _ => true,
        }
    }

    /// Eligible for marches, battles and AI actions.
    pub fn is_active(self) -> bool {
        !matches!(self, GeneralCondition::Captive | GeneralCondition::Dead)
    }
}

/// Diplomacy-value band label. Always derived from the numeric value;
/// never stored stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationLabel {
    Hostile,
    Cold,
    Neutral,
    Friendly,
    Tight,
}

impl RelationLabel {
    /// Band function over [0, 100]. The five bands partition the range
    /// with no gaps: 0-20, 21-40, 41-60, 61-80, 81-100.
    pub fn from_value(value: i32) -> Self {
        match value {
            i32::MIN..=20 => RelationLabel::Hostile,
            21..=40 => RelationLabel::Cold,
            41..=60 => RelationLabel::Neutral,
            61..=80 => RelationLabel::Friendly,
            _ => RelationLabel::Tight,
        }
    }
}

impl std::fmt::Display for RelationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationLabel::Hostile => "hostile",
            RelationLabel::Cold => "cold",
            RelationLabel::Neutral => "neutral",
            RelationLabel::Friendly => "friendly",
            RelationLabel::Tight => "tight",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    Calm,
    Northwest,
    Southeast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Plains,
    River,
    Coast,
    Mountain,
}

/// Population tier of a city, driving base food production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PopulationTier {
    Small,
    Medium,
    Large,
    Capital,
}

impl PopulationTier {
    /// Base food produced per turn before the agriculture multiplier.
    pub fn base_food_production(self) -> i64 {
        match self {
            PopulationTier::Small => 600,
            PopulationTier::Medium => 1000,
            PopulationTier::Large => 1600,
            PopulationTier::Capital => 2400,
        }
    }
}

/// Troop composition of a city garrison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TroopCounts {
    pub infantry: i64,
    pub cavalry: i64,
    pub navy: i64,
}

impl TroopCounts {
    pub fn total(&self) -> i64 {
        self.infantry + self.cavalry + self.navy
    }
}

/// City development tracks, each an ordered grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Development {
    pub agriculture: Grade,
    pub commerce: Grade,
    pub defense: Grade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub owner: FactionId,
    pub troops: TroopCounts,
    pub food: i64,
    pub morale: BoundedInt,
    /// Garrison training level (0..=100).
    pub training: BoundedInt,
    pub development: Development,
    pub population: PopulationTier,
    /// Adjacent city or battlefield ids, nearest first.
    pub adjacent: Vec<String>,
}

impl City {
    pub fn new(id: &str, name: &str, owner: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            troops: TroopCounts::default(),
            food: 0,
            morale: new_morale(70),
            training: BoundedInt::new(50, 0, 100),
            development: Development::default(),
            population: PopulationTier::Medium,
            adjacent: Vec::new(),
        }
    }
}

/// General ability ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Abilities {
    pub command: Grade,
    pub martial: Grade,
    pub intellect: Grade,
    pub politics: Grade,
    pub charisma: Grade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct General {
    pub id: GeneralId,
    pub name: String,
    pub faction: FactionId,
    pub role: String,
    pub abilities: Abilities,
    pub skills: Vec<String>,
    pub loyalty: Grade,
    /// Current city or battlefield id.
    pub location: String,
    pub condition: GeneralCondition,
}

impl General {
    pub fn new(id: &str, name: &str, faction: &str, location: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            faction: faction.to_string(),
            role: String::new(),
            abilities: Abilities::default(),
            skills: Vec::new(),
            loyalty: Grade::B,
            location: location.to_string(),
            condition: GeneralCondition::Fit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    /// Exactly one faction has this set.
    pub is_player: bool,
    pub leader: GeneralId,
}

/// Cap on the recent-history log carried by each relation.
pub const RELATION_EVENTS_CAP: usize = 8;

/// Diplomatic standing between an unordered pair of factions.
///
/// The pair is stored sorted (smaller id first) to avoid duplication,
/// mirroring how bilateral relations are keyed in the state graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiplomacyRelation {
    pub factions: (FactionId, FactionId),
    pub value: BoundedInt,
    pub label: RelationLabel,
    pub is_alliance: bool,
    /// Bounded recent-history log, oldest first.
    pub events: VecDeque<String>,
}

impl DiplomacyRelation {
    pub fn new(a: &str, b: &str, value: i32) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            factions: (a.to_string(), b.to_string()),
            value: new_relation_value(value),
            label: RelationLabel::from_value(value.clamp(0, 100)),
            is_alliance: false,
            events: VecDeque::new(),
        }
    }

    pub fn involves(&self, a: &str, b: &str) -> bool {
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        self.factions.0 == x && self.factions.1 == y
    }

    /// Push a note into the bounded history log, dropping the oldest.
    pub fn push_event(&mut self, note: String) {
        if self.events.len() == RELATION_EVENTS_CAP {
            self.events.pop_front();
        }
        self.events.push_back(note);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiplomacyState {
    pub relations: Vec<DiplomacyRelation>,
}

impl DiplomacyState {
    pub fn relation(&self, a: &str, b: &str) -> Option<&DiplomacyRelation> {
        self.relations.iter().find(|r| r.involves(a, b))
    }

    pub fn relation_mut(&mut self, a: &str, b: &str) -> Option<&mut DiplomacyRelation> {
        self.relations.iter_mut().find(|r| r.involves(a, b))
    }

    /// Whether `faction` holds any active alliance.
    pub fn has_any_alliance(&self, faction: &str) -> bool {
        self.relations
            .iter()
            .any(|r| r.is_alliance && (r.factions.0 == faction || r.factions.1 == faction))
    }
}

/// A combat-only location distinct from a city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battlefield {
    pub id: BattlefieldId,
    pub name: String,
    /// Return targets for surviving generals, nearest first.
    pub adjacent_cities: Vec<CityId>,
    pub terrain: Terrain,
    pub wind: WindDirection,
}

/// One side of an active battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSide {
    pub faction: FactionId,
    pub generals: Vec<GeneralId>,
    pub troops: i64,
    pub initial_troops: i64,
    pub morale: BoundedInt,
    pub formation: String,
}

impl BattleSide {
    pub fn new(faction: &str, troops: i64) -> Self {
        Self {
            faction: faction.to_string(),
            generals: Vec::new(),
            troops,
            initial_troops: troops,
            morale: new_morale(70),
            formation: "line".to_string(),
        }
    }

    /// Surviving-strength ratio in percent. Zero initial troops count as
    /// fully destroyed.
    pub fn survivor_ratio_pct(&self) -> i64 {
        if self.initial_troops <= 0 {
            return 0;
        }
        self.troops * 100 / self.initial_troops
    }
}

/// Terminal record of one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleResult {
    /// `None` on a draw.
    pub winner: Option<FactionId>,
    pub loser: Option<FactionId>,
    pub captured_generals: Vec<GeneralId>,
    /// City that changed hands, if any.
    pub territory_change: Option<CityId>,
}

impl BattleResult {
    pub fn draw() -> Self {
        Self {
            winner: None,
            loser: None,
            captured_generals: Vec::new(),
            territory_change: None,
        }
    }

    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }
}

/// A bounded-turn nested state machine for one clash.
///
/// Created on a march against hostile territory or by AI initiative;
/// destroyed (the active-battle slot is cleared) once the resolver has
/// finished post-battle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleState {
    /// City or battlefield id.
    pub location: String,
    /// True when the location is a city (siege rules apply on resolution).
    pub siege: bool,
    pub attacker: BattleSide,
    pub defender: BattleSide,
    pub battle_turn: u32,
    pub max_battle_turns: u32,
    pub available_tactics: Vec<TacticId>,
    pub terrain: Terrain,
    pub wind: WindDirection,
    /// Scripted rout: the named faction immediately loses.
    pub scripted_rout: Option<FactionId>,
    pub log: Vec<String>,
    pub is_over: bool,
    pub result: Option<BattleResult>,
}

impl BattleState {
    pub fn involves(&self, faction: &str) -> bool {
        self.attacker.faction == faction || self.defender.faction == faction
    }
}

/// What kind of entry an action-log line is. March entries carry the
/// origin city so post-battle routing can send a defeated attacker home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogKind {
    March { from: CityId, to: String },
    Battle,
    Event,
    Diplomacy,
    Development,
    Military,
    System,
}

/// Append-only turn log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub turn: u32,
    pub kind: LogKind,
    pub text: String,
}

/// Scenario-level objectives consulted by the victory judge and the
/// difficulty modifier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioGoals {
    /// Winning here as the player sets the decisive-victory flag.
    pub decisive_battlefield: Option<BattlefieldId>,
    pub primary_city: Option<CityId>,
    pub secondary_city: Option<CityId>,
    /// City whose garrison is scaled by the difficulty preset.
    pub contested_city: Option<CityId>,
}

/// Terminal campaign grade plus the human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignResult {
    pub grade: OutcomeGrade,
    pub reason: String,
}

/// Typed flag keys. Engine-known keys are enumerated; content-authored
/// annotations go through `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlagKey {
    DecisiveVictory,
    AllianceSealed,
    Difficulty,
    /// Troop-loss percentage at which a side collapses (difficulty-tuned).
    CollapseRatio,
    /// Morale penalty applied by collapse-adjacent events (difficulty-tuned).
    MoralePenalty,
    /// Minimum popular-support level tolerated by events/AI (difficulty-tuned).
    SupportFloor,
    /// Formation hint for a faction's AI, set by scripted events.
    AiFormation(FactionId),
    Custom(String),
}

impl FlagKey {
    fn encode(&self) -> String {
        match self {
            FlagKey::DecisiveVictory => "decisive_victory".to_string(),
            FlagKey::AllianceSealed => "alliance_sealed".to_string(),
            FlagKey::Difficulty => "difficulty".to_string(),
            FlagKey::CollapseRatio => "collapse_ratio".to_string(),
            FlagKey::MoralePenalty => "morale_penalty".to_string(),
            FlagKey::SupportFloor => "support_floor".to_string(),
            FlagKey::AiFormation(f) => format!("ai_formation:{f}"),
            FlagKey::Custom(s) => format!("custom:{s}"),
        }
    }

    fn decode(s: &str) -> Self {
        if let Some(f) = s.strip_prefix("ai_formation:") {
            return FlagKey::AiFormation(f.to_string());
        }
        if let Some(c) = s.strip_prefix("custom:") {
            return FlagKey::Custom(c.to_string());
        }
        match s {
            "decisive_victory" => FlagKey::DecisiveVictory,
            "alliance_sealed" => FlagKey::AllianceSealed,
            "difficulty" => FlagKey::Difficulty,
            "collapse_ratio" => FlagKey::CollapseRatio,
            "morale_penalty" => FlagKey::MoralePenalty,
            "support_floor" => FlagKey::SupportFloor,
            other => FlagKey::Custom(other.to_string()),
        }
    }
}

// Flags are serialized as string map keys so snapshots stay plain JSON.
impl Serialize for FlagKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for FlagKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FlagKey::decode(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// The complete mutable campaign state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub turn: u32,
    pub max_turns: u32,
    pub phase: Phase,
    pub season: String,
    pub actions_remaining: u32,
    pub cities: FxHashMap<CityId, City>,
    pub generals: FxHashMap<GeneralId, General>,
    pub factions: FxHashMap<FactionId, Faction>,
    pub battlefields: FxHashMap<BattlefieldId, Battlefield>,
    pub diplomacy: DiplomacyState,
    pub flags: FxHashMap<FlagKey, FlagValue>,
    /// Event ids that have fired. Only ever grows.
    pub completed_events: FxHashSet<EventId>,
    pub goals: ScenarioGoals,
    pub action_log: Vec<ActionLogEntry>,
    pub active_battle: Option<BattleState>,
    pub game_over: bool,
    pub result: Option<CampaignResult>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            turn: 1,
            max_turns: 15,
            phase: Phase::Preparation,
            season: String::new(),
            actions_remaining: crate::turn::ACTIONS_PER_TURN,
            cities: FxHashMap::default(),
            generals: FxHashMap::default(),
            factions: FxHashMap::default(),
            battlefields: FxHashMap::default(),
            diplomacy: DiplomacyState::default(),
            flags: FxHashMap::default(),
            completed_events: FxHashSet::default(),
            goals: ScenarioGoals::default(),
            action_log: Vec::new(),
            active_battle: None,
            game_over: false,
            result: None,
        }
    }
}

impl GameState {
    /// The player faction, when the scenario is well-formed.
    pub fn player_faction(&self) -> Option<&Faction> {
        let mut ids: Vec<&FactionId> = self.factions.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| &self.factions[id])
            .find(|f| f.is_player)
    }

    /// Ids of cities owned by `faction`, sorted for deterministic iteration.
    pub fn cities_of(&self, faction: &str) -> Vec<CityId> {
        let mut ids: Vec<CityId> = self
            .cities
            .values()
            .filter(|c| c.owner == faction)
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Non-player faction ids, sorted.
    pub fn ai_factions(&self) -> Vec<FactionId> {
        let mut ids: Vec<FactionId> = self
            .factions
            .values()
            .filter(|f| !f.is_player)
            .map(|f| f.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Generals of `faction` whose condition is Dead or Captive.
    pub fn lost_generals(&self, faction: &str) -> Vec<GeneralId> {
        let mut ids: Vec<GeneralId> = self
            .generals
            .values()
            .filter(|g| g.faction == faction && !g.condition.is_active())
            .map(|g| g.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Compute a deterministic checksum of the campaign state.
    ///
    /// Used for replay validation and divergence debugging: identical
    /// states produce identical checksums. Hash-map entries are visited
    /// in sorted key order.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.turn.hash(&mut hasher);
        self.max_turns.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.season.hash(&mut hasher);
        self.actions_remaining.hash(&mut hasher);

        let mut city_ids: Vec<_> = self.cities.keys().collect();
        city_ids.sort();
        for id in city_ids {
            let c = &self.cities[id];
            id.hash(&mut hasher);
            c.owner.hash(&mut hasher);
            c.troops.hash(&mut hasher);
            c.food.hash(&mut hasher);
            c.morale.hash(&mut hasher);
            c.training.hash(&mut hasher);
            c.development.hash(&mut hasher);
            c.population.hash(&mut hasher);
        }

        let mut general_ids: Vec<_> = self.generals.keys().collect();
        general_ids.sort();
        for id in general_ids {
            let g = &self.generals[id];
            id.hash(&mut hasher);
            g.faction.hash(&mut hasher);
            g.abilities.hash(&mut hasher);
            g.loyalty.hash(&mut hasher);
            g.location.hash(&mut hasher);
            g.condition.hash(&mut hasher);
        }

        let mut faction_ids: Vec<_> = self.factions.keys().collect();
        faction_ids.sort();
        for id in faction_ids {
            let f = &self.factions[id];
            id.hash(&mut hasher);
            f.is_player.hash(&mut hasher);
            f.leader.hash(&mut hasher);
        }

        for r in &self.diplomacy.relations {
            r.factions.hash(&mut hasher);
            r.value.hash(&mut hasher);
            r.label.hash(&mut hasher);
            r.is_alliance.hash(&mut hasher);
        }

        let mut flag_keys: Vec<_> = self.flags.keys().collect();
        flag_keys.sort();
        for key in flag_keys {
            key.hash(&mut hasher);
            match &self.flags[key] {
                FlagValue::Bool(b) => b.hash(&mut hasher),
                FlagValue::Int(i) => i.hash(&mut hasher),
                FlagValue::Text(t) => t.hash(&mut hasher),
            }
        }

        let mut completed: Vec<_> = self.completed_events.iter().collect();
        completed.sort();
        completed.hash(&mut hasher);

        self.action_log.len().hash(&mut hasher);
        for entry in &self.action_log {
            entry.turn.hash(&mut hasher);
            entry.text.hash(&mut hasher);
        }

        self.game_over.hash(&mut hasher);

        hasher.finish()
    }
}
