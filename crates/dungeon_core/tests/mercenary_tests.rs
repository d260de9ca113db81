//! Mercenary behavior: pursuit, blocking, bribing, allied movement.

use dungeon_core::prelude::*;
use dungeon_test_utils::fixtures::{find, position_of, Scenario};

#[test]
fn mercenary_in_line_with_player_moves_toward_them() {
    // Wall    Wall    Wall    Wall    Wall    Wall    Wall    Wall
    // P1      P2      P3      P4      .       .       .       M1
    // Wall    Wall    Wall    Wall    Wall    Wall    Wall    Wall
    let mut game = Scenario::new()
        .walled_corridor(0, 9, 1)
        .place("player", 1, 1)
        .place("mercenary", 8, 1)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, merc), (7, 1));
    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, merc), (6, 1));
    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, merc), (5, 1));
}

#[test]
fn mercenary_stops_when_it_cannot_get_closer() {
    let mut game = Scenario::new()
        .place("player", 1, 1)
        .place("mercenary", 4, 1)
        .place("wall", 3, 0)
        .place("wall", 4, 0)
        .place("wall", 5, 0)
        .place("wall", 3, 1)
        .place("wall", 5, 1)
        .place("wall", 3, 2)
        .place("wall", 4, 2)
        .place("wall", 5, 2)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, merc), (4, 1));
}

#[test]
fn mercenary_cannot_move_through_closed_doors() {
    let mut game = Scenario::new()
        .place("player", 1, 1)
        .place("mercenary", 4, 1)
        .place("wall", 3, 0)
        .place_spec(EntitySpec::new("door", 4, 0).with_key(1))
        .place("wall", 5, 0)
        .place("wall", 3, 1)
        .place("wall", 5, 1)
        .place("wall", 3, 2)
        .place("wall", 4, 2)
        .place("wall", 5, 2)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, merc), (4, 1));
}

#[test]
fn mercenary_routes_around_walls() {
    //                  Wall      M2
    // P1       P2      Wall      M1
    //                  Wall      M2
    let mut game = Scenario::new()
        .place("player", 1, 1)
        .place("mercenary", 4, 1)
        .place("wall", 3, 0)
        .place("wall", 3, 1)
        .place("wall", 3, 2)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick_move(Direction::Right);
    let position = position_of(&game, merc);
    assert!(position == (4, 0) || position == (4, 2));
}

#[test]
fn bribe_requires_full_amount_and_rejections_do_not_tick() {
    let mut game = Scenario::new()
        .config(|config| {
            config.bribe_amount = 3;
            config.bribe_radius = 10;
        })
        .walled_corridor(0, 9, 1)
        .place("player", 1, 1)
        .place("treasure", 2, 1)
        .place("treasure", 3, 1)
        .place("treasure", 4, 1)
        .place("mercenary", 8, 1)
        .build();
    let merc = find(&game, "mercenary");

    // One treasure is not enough.
    let _ = game.tick_move(Direction::Right);
    assert!(matches!(game.interact(merc), Err(GameError::InvalidAction(_))));
    assert_eq!(game.get_tick(), 1);
    assert_eq!(game.inventory_snapshots().len(), 1);

    // Two treasures are not enough either.
    let _ = game.tick_move(Direction::Right);
    assert!(matches!(game.interact(merc), Err(GameError::InvalidAction(_))));
    assert_eq!(game.get_tick(), 2);

    // The third treasure completes the bribe.
    let _ = game.tick_move(Direction::Right);
    let tick = game.interact(merc).expect("bribe should succeed");
    assert_eq!(tick, 4);
    assert!(game.inventory_snapshots().is_empty());
    assert!(!game.currently_interactable(merc));
}

#[test]
fn allied_mercenary_does_not_battle_and_follows() {
    let mut game = Scenario::new()
        .config(|config| config.bribe_radius = 20)
        .walled_corridor(0, 9, 1)
        .place("player", 3, 1)
        .place("treasure", 4, 1)
        .place("mercenary", 7, 1)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick_move(Direction::Right); // pick up treasure, merc at (6,1)
    let _ = game.interact(merc).expect("bribe should succeed");

    // Walk left; the ally trails through the player's previous cells.
    for _ in 0..3 {
        let _ = game.tick_move(Direction::Left);
    }

    // No battles were fought while allied, and the ally kept pace one
    // cell behind the player.
    assert!(game.battle_log().is_empty());
    assert!(game.map().contains(merc));
    let player = game.map().player_id().unwrap();
    let (px, py) = position_of(&game, player);
    assert_eq!(position_of(&game, merc), (px + 1, py));
}
