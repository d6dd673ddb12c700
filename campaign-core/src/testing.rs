//! Test fixtures: a fluent state builder, a canned field battle and a
//! small bundled scenario.
//!
//! Lives outside `#[cfg(test)]` so downstream crates can build
//! campaign states in their own tests.

use crate::events::{CityFilter, Effect, EventRule, Trigger};
use crate::grade::Grade;
use crate::scenario::{RelationSeed, ScenarioTemplate};
use crate::state::{
    Battlefield, BattleSide, BattleState, City, DiplomacyRelation, Faction, GameState, General,
    PopulationTier, ScenarioGoals, Terrain, TroopCounts, WindDirection,
};

/// Fluent builder for hand-rolled campaign states.
///
/// Cities default to 70 morale, medium population and C-grade
/// development; generals start fit with default abilities. Everything
/// can be tweaked on the returned state afterwards.
#[derive(Debug, Default)]
pub struct GameStateBuilder {
    state: GameState,
}

impl GameStateBuilder {
    pub fn new() -> Self {
        Self {
            state: GameState::default(),
        }
    }

    pub fn turn(mut self, turn: u32) -> Self {
        self.state.turn = turn;
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.state.max_turns = max_turns;
        self
    }

    pub fn with_faction(mut self, id: &str, is_player: bool, leader: &str) -> Self {
        self.state.factions.insert(
            id.to_string(),
            Faction {
                id: id.to_string(),
                name: id.to_string(),
                is_player,
                leader: leader.to_string(),
            },
        );
        self
    }

    pub fn with_city(mut self, id: &str, owner: &str, infantry: i64, food: i64) -> Self {
        let mut city = City::new(id, id, owner);
        city.troops.infantry = infantry;
        city.food = food;
        city.population = PopulationTier::Medium;
        city.development.agriculture = Grade::C;
        city.development.commerce = Grade::C;
        city.development.defense = Grade::C;
        self.state.cities.insert(id.to_string(), city);
        self
    }

    pub fn with_general(mut self, id: &str, faction: &str, location: &str) -> Self {
        self.state
            .generals
            .insert(id.to_string(), General::new(id, id, faction, location));
        self
    }

    /// Set an existing general's martial grade. Must come after the
    /// matching `with_general`.
    pub fn with_general_martial(mut self, id: &str, martial: Grade) -> Self {
        if let Some(g) = self.state.generals.get_mut(id) {
            g.abilities.martial = martial;
        }
        self
    }

    pub fn with_relation(mut self, a: &str, b: &str, value: i32) -> Self {
        self.state
            .diplomacy
            .relations
            .push(DiplomacyRelation::new(a, b, value));
        self
    }

    pub fn with_battlefield(mut self, id: &str, adjacent: &[&str]) -> Self {
        self.state.battlefields.insert(
            id.to_string(),
            Battlefield {
                id: id.to_string(),
                name: id.to_string(),
                adjacent_cities: adjacent.iter().map(|s| s.to_string()).collect(),
                terrain: Terrain::Plains,
                wind: WindDirection::Calm,
            },
        );
        self
    }

    pub fn decisive_battlefield(mut self, id: &str) -> Self {
        self.state.goals.decisive_battlefield = Some(id.to_string());
        self
    }

    pub fn primary_city(mut self, id: &str) -> Self {
        self.state.goals.primary_city = Some(id.to_string());
        self
    }

    pub fn secondary_city(mut self, id: &str) -> Self {
        self.state.goals.secondary_city = Some(id.to_string());
        self
    }

    pub fn contested_city(mut self, id: &str) -> Self {
        self.state.goals.contested_city = Some(id.to_string());
        self
    }

    pub fn build(self) -> GameState {
        self.state
    }
}

/// A ready-to-run open-field battle between two factions.
pub fn field_battle(attacker: &str, defender: &str, atk_troops: i64, def_troops: i64) -> BattleState {
    BattleState {
        location: "field".to_string(),
        siege: false,
        attacker: BattleSide::new(attacker, atk_troops),
        defender: BattleSide::new(defender, def_troops),
        battle_turn: 0,
        max_battle_turns: 10,
        available_tactics: vec![
            "hold".to_string(),
            "volley".to_string(),
            "charge".to_string(),
            "ambush".to_string(),
        ],
        terrain: Terrain::Plains,
        wind: WindDirection::Calm,
        scripted_rout: None,
        log: Vec::new(),
        is_over: false,
        result: None,
    }
}

/// Small three-faction scenario used by driver tests and as a data
/// template example.
pub fn demo_template() -> ScenarioTemplate {
    let mut chengdu = City::new("chengdu", "Chengdu", "shu");
    chengdu.troops = TroopCounts {
        infantry: 30_000,
        cavalry: 5_000,
        navy: 0,
    };
    chengdu.food = 40_000;
    chengdu.population = PopulationTier::Capital;
    chengdu.development.agriculture = Grade::B;
    chengdu.development.defense = Grade::B;
    chengdu.adjacent = vec!["jiangling".to_string()];

    let mut jiangling = City::new("jiangling", "Jiangling", "shu");
    jiangling.troops = TroopCounts {
        infantry: 15_000,
        cavalry: 2_000,
        navy: 8_000,
    };
    jiangling.food = 20_000;
    jiangling.population = PopulationTier::Medium;
    jiangling.adjacent = vec!["chibi".to_string(), "xiangyang".to_string()];

    let mut xiangyang = City::new("xiangyang", "Xiangyang", "wei");
    xiangyang.troops = TroopCounts {
        infantry: 40_000,
        cavalry: 10_000,
        navy: 12_000,
    };
    xiangyang.food = 50_000;
    xiangyang.population = PopulationTier::Large;
    xiangyang.development.defense = Grade::A;
    xiangyang.adjacent = vec!["chibi".to_string(), "jiangling".to_string()];

    let mut xuchang = City::new("xuchang", "Xuchang", "wei");
    xuchang.troops = TroopCounts {
        infantry: 25_000,
        cavalry: 8_000,
        navy: 0,
    };
    xuchang.food = 45_000;
    xuchang.population = PopulationTier::Capital;
    xuchang.adjacent = vec!["xiangyang".to_string()];

    let mut chaisang = City::new("chaisang", "Chaisang", "wu");
    chaisang.troops = TroopCounts {
        infantry: 20_000,
        cavalry: 2_000,
        navy: 15_000,
    };
    chaisang.food = 30_000;
    chaisang.population = PopulationTier::Medium;
    chaisang.adjacent = vec!["chibi".to_string()];

    let mut liubei = General::new("liubei", "Liu Bei", "shu", "chengdu");
    liubei.role = "leader".to_string();
    liubei.abilities.charisma = Grade::S;
    liubei.abilities.command = Grade::B;

    let mut guanyu = General::new("guanyu", "Guan Yu", "shu", "jiangling");
    guanyu.abilities.martial = Grade::S;
    guanyu.abilities.command = Grade::A;

    let mut caocao = General::new("caocao", "Cao Cao", "wei", "xiangyang");
    caocao.role = "leader".to_string();
    caocao.abilities.command = Grade::S;
    caocao.abilities.intellect = Grade::A;

    let mut sunquan = General::new("sunquan", "Sun Quan", "wu", "chaisang");
    sunquan.role = "leader".to_string();
    sunquan.abilities.politics = Grade::A;

    ScenarioTemplate {
        name: "Red Cliffs".to_string(),
        max_turns: 15,
        factions: vec![
            Faction {
                id: "shu".to_string(),
                name: "Shu".to_string(),
                is_player: true,
                leader: "liubei".to_string(),
            },
            Faction {
                id: "wei".to_string(),
                name: "Wei".to_string(),
                is_player: false,
                leader: "caocao".to_string(),
            },
            Faction {
                id: "wu".to_string(),
                name: "Wu".to_string(),
                is_player: false,
                leader: "sunquan".to_string(),
            },
        ],
        cities: vec![chengdu, jiangling, xiangyang, xuchang, chaisang],
        generals: vec![liubei, guanyu, caocao, sunquan],
        battlefields: vec![Battlefield {
            id: "chibi".to_string(),
            name: "Chibi".to_string(),
            adjacent_cities: vec!["jiangling".to_string(), "xiangyang".to_string()],
            terrain: Terrain::River,
            wind: WindDirection::Calm,
        }],
        relations: vec![
            RelationSeed {
                a: "shu".to_string(),
                b: "wu".to_string(),
                value: 65,
                is_alliance: false,
            },
            RelationSeed {
                a: "shu".to_string(),
                b: "wei".to_string(),
                value: 15,
                is_alliance: false,
            },
            RelationSeed {
                a: "wei".to_string(),
                b: "wu".to_string(),
                value: 25,
                is_alliance: false,
            },
        ],
        goals: ScenarioGoals {
            decisive_battlefield: Some("chibi".to_string()),
            primary_city: Some("xiangyang".to_string()),
            secondary_city: Some("xuchang".to_string()),
            contested_city: Some("xiangyang".to_string()),
        },
        events: vec![
            EventRule {
                id: "wu_envoys".to_string(),
                name: "Envoys from Wu".to_string(),
                trigger: Trigger::TurnIs { turn: 2 },
                effects: vec![Effect::RelationDelta {
                    a: "shu".to_string(),
                    b: "wu".to_string(),
                    delta: 10,
                }],
                narrative: "Zhou Yu sends envoys proposing a joint stand on the river.".to_string(),
            },
            EventRule {
                id: "southeast_wind".to_string(),
                name: "The Southeast Wind Rises".to_string(),
                trigger: Trigger::TurnBetween { from: 9, to: 12 },
                effects: vec![Effect::SetFlag {
                    key: crate::state::FlagKey::Custom("southeast_wind".to_string()),
                    value: crate::state::FlagValue::Bool(true),
                }],
                narrative: "An unseasonal wind blows from the southeast.".to_string(),
            },
            EventRule {
                id: "wei_plague".to_string(),
                name: "Sickness in the Northern Camp".to_string(),
                trigger: Trigger::Chance {
                    from: 4,
                    to: 8,
                    p: 0.5,
                },
                effects: vec![Effect::CityMorale {
                    filter: CityFilter::OwnedBy {
                        faction: "wei".to_string(),
                    },
                    delta: -10,
                }],
                narrative: "Fever spreads through the northern encampments.".to_string(),
            },
        ],
    }
}
