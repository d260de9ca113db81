//! Portal behavior: teleportation and path transparency.

use dungeon_core::prelude::*;
use dungeon_test_utils::fixtures::{find, position_of, Scenario};

fn cardinally_adjacent(a: (i32, i32), b: (i32, i32)) -> bool {
    (a.0 - b.0).abs() + (a.1 - b.1).abs() == 1
}

#[test]
fn walking_into_a_portal_lands_beside_its_pair() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place_spec(EntitySpec::new("portal", 1, 0).with_color("blue"))
        .place_spec(EntitySpec::new("portal", 5, 5).with_color("blue"))
        .build();
    let player = game.map().player_id().unwrap();

    let _ = game.tick_move(Direction::Right);

    let position = position_of(&game, player);
    assert!(
        cardinally_adjacent(position, (5, 5)),
        "player should stand beside the pair, got {position:?}"
    );
    assert_ne!(position, (1, 0), "player must not stand on the entry portal");
    assert_ne!(position, (5, 5), "player must not stand on the exit portal");
}

#[test]
fn an_unpaired_portal_vetoes_movement() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place_spec(EntitySpec::new("portal", 1, 0).with_color("red"))
        .build();
    let player = game.map().player_id().unwrap();

    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, player), (0, 0));
}

#[test]
fn mercenaries_teleport_too() {
    // The mercenary's only way out of its corridor is the portal.
    let mut game = Scenario::new()
        .walled_corridor(4, 8, 0)
        .place_spec(EntitySpec::new("portal", 4, 0).with_color("grey"))
        .place("mercenary", 5, 0)
        .place("wall", 8, 0)
        .place_spec(EntitySpec::new("portal", 0, 5).with_color("grey"))
        .place("player", 0, 7)
        .build();
    let merc = find(&game, "mercenary");

    let _ = game.tick();

    let position = position_of(&game, merc);
    assert!(
        cardinally_adjacent(position, (0, 5)),
        "mercenary should have come through the portal, got {position:?}"
    );
}

#[test]
fn zombies_walk_over_portals_without_teleporting() {
    // Teleportation is for the player and mercenaries; a zombie may
    // stand on a portal tile.
    let mut game = Scenario::new()
        .place("player", 9, 9)
        .place("zombie_toast", 1, 0)
        .place_spec(EntitySpec::new("portal", 0, 0).with_color("blue"))
        .place_spec(EntitySpec::new("portal", 5, 5).with_color("blue"))
        // Box the zombie so its only open neighbor is the portal tile.
        .place("wall", 1, -1)
        .place("wall", 2, 0)
        .place("wall", 1, 1)
        .build();
    let zombie = find(&game, "zombie_toast");

    let _ = game.tick();

    let position = position_of(&game, zombie);
    assert_eq!(position, (0, 0), "zombie should stand on the portal tile");
}
