//! Combat module
//!
//! Only the request contract and damage formula exist; attacks are
//! always refused.

use rand::Rng;
use uuid::Uuid;

use crate::error::GameError;
use crate::game::player::PlayerRegistry;

/// Validate an attack request. No attack is ever carried out.
pub fn initiate_pvp(players: &PlayerRegistry, attacker: &Uuid, defender: &Uuid) -> Result<(), GameError> {
    if !players.contains(attacker) || !players.contains(defender) {
        return Err(GameError::InvalidAction("Player not found.".to_string()));
    }
    Err(GameError::NotImplemented("PvP combat coming soon!".to_string()))
}

/// `max(1, attack + U{-2..=2} - floor(defense / 2))`
pub fn calculate_damage<R: Rng + ?Sized>(attack: u32, defense: u32, rng: &mut R) -> u32 {
    let variation: i64 = rng.gen_range(-2..=2);
    let damage = i64::from(attack) + variation - i64::from(defense / 2);
    damage.max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::TilePos;
    use crate::game::player::Player;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_damage_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let damage = calculate_damage(10, 4, &mut rng);
            assert!((6..=10).contains(&damage), "damage {}", damage);
        }
    }

    #[test]
    fn test_damage_floor() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(calculate_damage(1, 40, &mut rng), 1);
        }
    }

    #[test]
    fn test_pvp_is_refused() {
        let mut players = PlayerRegistry::new();
        let a = players
            .insert(Player::new(1, "Alpha".into(), TilePos::new(1, 1), 2.5))
            .unwrap();
        let b = players
            .insert(Player::new(2, "Bravo".into(), TilePos::new(2, 1), 2.5))
            .unwrap();

        let err = initiate_pvp(&players, &a, &b).unwrap_err();
        assert_eq!(err.to_string(), "PvP combat coming soon!");

        let err = initiate_pvp(&players, &a, &Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "Player not found.");
    }
}
