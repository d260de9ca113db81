//! Battle statistics and resolution.
//!
//! All battle arithmetic uses fixed-point math for deterministic results
//! across platforms. Floating-point values only appear at the config
//! boundary, where they are converted once.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind};
use crate::game::Game;

/// Fixed-point number type for all battle math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = fixed::types::I32F32;

/// Default attack magnifier applied to base statistics.
pub const DEFAULT_DAMAGE_MAGNIFIER: i64 = 1;
/// Default damage reducer for the player (incoming damage / 10).
pub const DEFAULT_PLAYER_DAMAGE_REDUCER: i64 = 10;
/// Default damage reducer for enemies (incoming damage / 5).
pub const DEFAULT_ENEMY_DAMAGE_REDUCER: i64 = 5;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// The collection of battle-related attributes carried by the player and
/// every enemy, and composed out of item/ally/potion buffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStatistics {
    /// Remaining health. The owner is destroyed when this reaches zero.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Base attack value.
    #[serde(with = "fixed_serde")]
    pub attack: Fixed,
    /// Flat defence subtracted from incoming attack.
    #[serde(with = "fixed_serde")]
    pub defence: Fixed,
    /// Multiplier applied to outgoing damage.
    #[serde(with = "fixed_serde")]
    pub magnifier: Fixed,
    /// Divisor applied to incoming damage.
    #[serde(with = "fixed_serde")]
    pub reducer: Fixed,
    /// Invincible combatants win in a single rout round.
    pub invincible: bool,
    /// When `false`, no battle takes place at all.
    pub enabled: bool,
}

impl BattleStatistics {
    /// Create base statistics with default magnifier and the given reducer.
    #[must_use]
    pub fn new(health: Fixed, attack: Fixed, defence: Fixed, reducer: i64) -> Self {
        Self {
            health,
            attack,
            defence,
            magnifier: Fixed::from_num(DEFAULT_DAMAGE_MAGNIFIER),
            reducer: Fixed::from_num(reducer),
            invincible: false,
            enabled: true,
        }
    }

    /// A neutral buff that changes nothing when applied.
    #[must_use]
    pub fn neutral_buff() -> Self {
        Self {
            health: Fixed::ZERO,
            attack: Fixed::ZERO,
            defence: Fixed::ZERO,
            magnifier: Fixed::from_num(1),
            reducer: Fixed::from_num(1),
            invincible: false,
            enabled: true,
        }
    }

    /// A buff contributing flat attack (swords, allied mercenaries).
    #[must_use]
    pub fn attack_buff(attack: Fixed) -> Self {
        Self {
            attack,
            ..Self::neutral_buff()
        }
    }

    /// A buff contributing flat defence (shields, allied mercenaries).
    #[must_use]
    pub fn defence_buff(defence: Fixed) -> Self {
        Self {
            defence,
            ..Self::neutral_buff()
        }
    }

    /// A buff multiplying outgoing damage (bows double it).
    #[must_use]
    pub fn magnifier_buff(magnifier: Fixed) -> Self {
        Self {
            magnifier,
            ..Self::neutral_buff()
        }
    }

    /// The invincibility-potion buff: battles end instantly in a rout.
    #[must_use]
    pub fn invincible_buff() -> Self {
        Self {
            invincible: true,
            ..Self::neutral_buff()
        }
    }

    /// The invisibility-potion buff: battles are disabled entirely.
    #[must_use]
    pub fn disabled_buff() -> Self {
        Self {
            enabled: false,
            ..Self::neutral_buff()
        }
    }

    /// Apply a buff on top of base statistics.
    ///
    /// Health/attack/defence add, magnifiers multiply, the reducer is
    /// untouched, and the buff's invincible/enabled flags win outright.
    #[must_use]
    pub fn apply_buff(origin: Self, buff: Self) -> Self {
        Self {
            health: origin.health + buff.health,
            attack: origin.attack + buff.attack,
            defence: origin.defence + buff.defence,
            magnifier: origin.magnifier * buff.magnifier,
            reducer: origin.reducer,
            invincible: buff.invincible,
            enabled: buff.enabled,
        }
    }

    /// Run a battle between two sets of statistics, mutating both healths
    /// in place and returning the rounds fought.
    ///
    /// Each round both sides simultaneously lose
    /// `magnifier * (attack - defence) / reducer` until one side's health
    /// reaches zero. If exactly one side is invincible the battle is a
    /// one-round rout.
    pub fn battle(this: &mut Self, target: &mut Self) -> Vec<BattleRound> {
        let mut rounds = Vec::new();

        if this.invincible ^ target.invincible {
            let damage_on_this = if this.invincible {
                Fixed::ZERO
            } else {
                this.health
            };
            let damage_on_target = if target.invincible {
                Fixed::ZERO
            } else {
                target.health
            };
            this.health -= damage_on_this;
            target.health -= damage_on_target;
            rounds.push(BattleRound {
                delta_self_health: -damage_on_this,
                delta_target_health: -damage_on_target,
            });
            return rounds;
        }

        while this.health > Fixed::ZERO && target.health > Fixed::ZERO {
            let damage_on_this = target.magnifier * (target.attack - this.defence) / this.reducer;
            let damage_on_target = this.magnifier * (this.attack - target.defence) / target.reducer;
            this.health -= damage_on_this;
            target.health -= damage_on_target;
            rounds.push(BattleRound {
                delta_self_health: -damage_on_this,
                delta_target_health: -damage_on_target,
            });
        }
        rounds
    }
}

/// Health deltas of one battle round, as observed by the player side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRound {
    /// Change in the player's health (negative when damaged).
    #[serde(with = "fixed_serde")]
    pub delta_self_health: Fixed,
    /// Change in the enemy's health (negative when damaged).
    #[serde(with = "fixed_serde")]
    pub delta_target_health: Fixed,
}

/// Record of one finished battle, appended to the game's battle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BattleResponse {
    /// Kind name of the enemy fought.
    pub enemy: &'static str,
    /// Rounds fought, in order.
    pub rounds: Vec<BattleRound>,
    /// Kind names of the inventory items that contributed buffs.
    pub battle_items: Vec<&'static str>,
    /// Player health before the battle.
    #[serde(with = "fixed_serde")]
    pub initial_player_health: Fixed,
    /// Enemy health before the battle.
    #[serde(with = "fixed_serde")]
    pub initial_enemy_health: Fixed,
}

/// Run a battle between the player and an enemy, mutating both healths
/// and logging a [`BattleResponse`].
///
/// Buff assembly: an active potion overrides item buffs entirely;
/// otherwise every weapon-class inventory item contributes its buff and
/// spends one point of durability. Allied mercenaries always contribute
/// their ally statistics on top.
pub(crate) fn run_battle(game: &mut Game, player_id: EntityId, enemy_id: EntityId) {
    let Some((initial_player_health, player_base)) = game
        .map
        .player_state()
        .map(|player| (player.stats.health, player.stats))
    else {
        return;
    };
    let Some((initial_enemy_health, enemy_base, enemy_name)) =
        game.map.get(enemy_id).and_then(|enemy| {
            let stats = enemy.kind.battle_statistics()?;
            Some((stats.health, stats, enemy.kind.kind_name()))
        })
    else {
        return;
    };

    let mut buff = BattleStatistics::neutral_buff();
    let mut battle_items: Vec<&'static str> = Vec::new();
    let mut spent_weapons: Vec<EntityId> = Vec::new();

    if game.map.player_state().and_then(|p| p.active_potion).is_some() {
        buff = crate::player::apply_potion_buff(game, buff);
    } else {
        let inventory: Vec<EntityId> = game
            .map
            .player_state()
            .map(|p| p.inventory.clone())
            .unwrap_or_default();
        for item_id in inventory {
            let Some(item) = game.map.get(item_id) else {
                continue;
            };
            let item_buff = match item.kind {
                EntityKind::Sword { attack, .. } => BattleStatistics::attack_buff(attack),
                EntityKind::Shield { defence, .. } => BattleStatistics::defence_buff(defence),
                EntityKind::Bow { .. } => BattleStatistics::magnifier_buff(Fixed::from_num(2)),
                _ => continue,
            };
            buff = BattleStatistics::apply_buff(buff, item_buff);
            battle_items.push(item.kind.kind_name());
            spent_weapons.push(item_id);
        }
    }

    for merc_id in game.map.sorted_ids() {
        let Some(entity) = game.map.get(merc_id) else {
            continue;
        };
        if let EntityKind::Mercenary(ref merc) = entity.kind {
            if merc.allied {
                let ally = BattleStatistics {
                    attack: merc.ally_attack,
                    defence: merc.ally_defence,
                    ..BattleStatistics::neutral_buff()
                };
                buff = BattleStatistics::apply_buff(buff, ally);
            }
        }
    }

    let mut player_stats = BattleStatistics::apply_buff(player_base, buff);
    let mut enemy_stats = enemy_base;
    if !player_stats.enabled || !enemy_stats.enabled {
        return;
    }

    let rounds = BattleStatistics::battle(&mut player_stats, &mut enemy_stats);
    tracing::debug!(
        enemy = enemy_name,
        rounds = rounds.len(),
        "battle resolved"
    );

    // Write fought healths back to the base statistics.
    if let Some(player) = game.map.player_state_mut() {
        player.stats.health = player_stats.health;
    }
    if let Some(enemy) = game.map.get_mut(enemy_id) {
        if let Some(stats) = enemy.kind.battle_statistics_mut() {
            stats.health = enemy_stats.health;
        }
    }

    for weapon_id in spent_weapons {
        crate::player::spend_weapon_durability(game, weapon_id);
    }

    game.battle_log.push(BattleResponse {
        enemy: enemy_name,
        rounds,
        battle_items,
        initial_player_health,
        initial_enemy_health,
    });
}
