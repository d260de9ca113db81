//! End-to-end gameplay: boulders, goals, items, battles, spawners.

use dungeon_core::prelude::*;
use dungeon_test_utils::determinism::{assert_deterministic, Input};
use dungeon_test_utils::fixtures::{alive, find, position_of, Scenario};

#[test]
fn pushing_a_boulder_onto_a_switch_completes_the_boulders_goal() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("boulder", 1, 0)
        .place("switch", 2, 0)
        .goal(GoalSpec::leaf("boulders"))
        .build();

    assert!(!game.goal_achieved());
    assert_eq!(game.goal_label(), ":boulders");

    let _ = game.tick_move(Direction::Right);

    assert!(game.goal_achieved());
    assert_eq!(game.goal_label(), "");
}

#[test]
fn boulders_do_not_push_into_walls_or_other_boulders() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("boulder", 1, 0)
        .place("wall", 2, 0)
        .place("boulder", 0, 1)
        .place("boulder", 0, 2)
        .build();
    let player = game.map().player_id().unwrap();

    // Wall behind the boulder: the whole move is vetoed.
    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, player), (0, 0));

    // Boulder behind the boulder: also vetoed.
    let _ = game.tick_move(Direction::Down);
    assert_eq!(position_of(&game, player), (0, 0));
}

#[test]
fn vetoed_moves_leave_distinct_position_history_alone() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("wall", 2, 0)
        .build();
    let player = game.map().player_id().unwrap();

    let _ = game.tick_move(Direction::Right);
    let recorded = game
        .map()
        .get(player)
        .unwrap()
        .previous_distinct_position();
    assert_eq!(recorded.map(|p| (p.x, p.y)), Some((0, 0)));

    // Walking into the wall twice changes nothing.
    let _ = game.tick_move(Direction::Right);
    let _ = game.tick_move(Direction::Right);
    let recorded = game
        .map()
        .get(player)
        .unwrap()
        .previous_distinct_position();
    assert_eq!(recorded.map(|p| (p.x, p.y)), Some((0, 0)));
}

#[test]
fn reaching_the_exit_completes_the_exit_goal() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("exit", 2, 0)
        .goal(GoalSpec::leaf("exit"))
        .build();

    let _ = game.tick_move(Direction::Right);
    assert!(!game.goal_achieved());
    let _ = game.tick_move(Direction::Right);
    assert!(game.goal_achieved());
}

#[test]
fn composite_goals_render_with_their_operator() {
    let game = Scenario::new()
        .place("player", 0, 0)
        .place("exit", 5, 0)
        .place("switch", 6, 0)
        .goal(GoalSpec::composite(
            "AND",
            vec![GoalSpec::leaf("exit"), GoalSpec::leaf("boulders")],
        ))
        .build();
    assert_eq!(game.goal_label(), "(:exit AND :boulders)");
}

#[test]
fn doors_unlock_with_the_matching_key_only() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place_spec(EntitySpec::new("key", 1, 0).with_key(2))
        .place_spec(EntitySpec::new("door", 2, 0).with_key(1))
        .place_spec(EntitySpec::new("door", 2, 1).with_key(2))
        .build();
    let player = game.map().player_id().unwrap();
    let wrong_door = game
        .map()
        .ids_where(|entity| matches!(entity.kind.kind_name(), "door"))[0];

    // Pick up key #2; door #1 stays shut.
    let _ = game.tick_move(Direction::Right);
    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, player), (1, 0));
    assert!(!game.map().get(wrong_door).unwrap().kind.is_open());

    // Door #2 opens and consumes the key.
    let _ = game.tick_move(Direction::Down);
    let _ = game.tick_move(Direction::Right);
    assert_eq!(position_of(&game, player), (2, 1));
    assert!(game.inventory_snapshots().is_empty());
}

#[test]
fn battles_spend_weapons_and_log_rounds() {
    let mut game = Scenario::new()
        .config(|config| {
            config.player_health = 100.0;
            config.sword_durability = 2;
        })
        .walled_corridor(0, 6, 0)
        .place("player", 0, 0)
        .place("sword", 1, 0)
        .place("mercenary", 6, 0)
        .build();
    let merc = find(&game, "mercenary");

    // Pick up the sword, then let the mercenary close in and die.
    let _ = game.tick_move(Direction::Right);
    for _ in 0..6 {
        if !alive(&game, merc) {
            break;
        }
        let _ = game.tick();
    }

    assert!(!alive(&game, merc));
    assert!(game.map().player_id().is_some());
    assert_eq!(game.battle_log().len(), 1);
    let response = &game.battle_log()[0];
    assert_eq!(response.enemy, "mercenary");
    assert!(!response.rounds.is_empty());
    assert_eq!(response.battle_items, vec!["sword"]);
}

#[test]
fn invisibility_suppresses_battles_entirely() {
    let mut game = Scenario::new()
        .config(|config| config.invisibility_potion_duration = 50)
        .walled_corridor(0, 6, 0)
        .place("player", 0, 0)
        .place("invisibility_potion", 1, 0)
        .place("mercenary", 6, 0)
        .build();
    let merc = find(&game, "mercenary");
    let potion = find(&game, "invisibility_potion");

    let _ = game.tick_move(Direction::Right);
    let _ = game.tick_use_item(potion).expect("potion should be usable");

    // The mercenary wanders blindly; whatever happens, no battle fires.
    for _ in 0..8 {
        let _ = game.tick();
    }
    assert!(game.battle_log().is_empty());
    assert!(alive(&game, merc));
    assert!(game.map().player_id().is_some());
}

#[test]
fn invincibility_routs_enemies_in_one_round() {
    let mut game = Scenario::new()
        .walled_corridor(3, 5, 0)
        .place("player", 0, 0)
        .place("invincibility_potion", 1, 0)
        .place("mercenary", 4, 0)
        .place("wall", 5, 0)
        .build();
    let merc = find(&game, "mercenary");
    let potion = find(&game, "invincibility_potion");

    let _ = game.tick_move(Direction::Right); // pick up, merc approaches
    let _ = game.tick_use_item(potion).expect("potion should be usable");

    // The mercenary now flees into the dead end; walk onto it.
    let _ = game.tick_move(Direction::Right);
    let _ = game.tick_move(Direction::Right);
    let _ = game.tick_move(Direction::Right);

    assert!(!alive(&game, merc));
    assert_eq!(game.battle_log().len(), 1);
    assert_eq!(game.battle_log()[0].rounds.len(), 1);
    // The rout costs the player nothing.
    assert_eq!(
        game.battle_log()[0].rounds[0].delta_self_health,
        Fixed::ZERO
    );
}

#[test]
fn crafting_consumes_materials() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("wood", 1, 0)
        .place("arrow", 2, 0)
        .place("arrow", 3, 0)
        .place("arrow", 4, 0)
        .build();

    for _ in 0..4 {
        let _ = game.tick_move(Direction::Right);
    }
    assert_eq!(game.inventory_snapshots().len(), 4);

    let _ = game.build(Buildable::Bow).expect("bow should be buildable");

    let inventory = game.inventory_snapshots();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].kind, "bow");
    // Materials are gone for good; a second bow is rejected tick-free.
    let before = game.get_tick();
    assert!(matches!(
        game.build(Buildable::Bow),
        Err(GameError::InvalidAction(_))
    ));
    assert_eq!(game.get_tick(), before);
}

#[test]
fn shields_accept_a_key_in_place_of_treasure() {
    let mut game = Scenario::new()
        .place("player", 0, 0)
        .place("wood", 1, 0)
        .place("wood", 2, 0)
        .place_spec(EntitySpec::new("key", 3, 0).with_key(1))
        .build();

    for _ in 0..3 {
        let _ = game.tick_move(Direction::Right);
    }
    let _ = game
        .build(Buildable::Shield)
        .expect("shield should be buildable");

    let inventory = game.inventory_snapshots();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].kind, "shield");
}

#[test]
fn zombie_spawners_emit_on_their_cadence_and_break_to_a_weapon() {
    let mut game = Scenario::new()
        .config(|config| config.zombie_spawn_rate = 3)
        .place("player", 0, 0)
        .place("sword", 1, 0)
        .place("zombie_toast_spawner", 2, 0)
        .build();
    let spawner = find(&game, "zombie_toast_spawner");

    // No weapon yet: interacting is rejected without a tick.
    assert!(matches!(
        game.interact(spawner),
        Err(GameError::InvalidAction(_))
    ));
    assert_eq!(game.get_tick(), 0);

    let zombies = |game: &Game| {
        game.map()
            .ids_where(|entity| entity.kind.kind_name() == "zombie_toast")
            .len()
    };

    let _ = game.tick(); // tick 1
    let _ = game.tick(); // tick 2
    assert_eq!(zombies(&game), 0);
    let _ = game.tick(); // tick 3: first spawn
    assert_eq!(zombies(&game), 1);

    // Armed and adjacent: the spawner goes down.
    let _ = game.tick_move(Direction::Right);
    let _ = game.interact(spawner).expect("spawner should break");
    assert!(!alive(&game, spawner));
    assert!(matches!(
        game.interact(spawner),
        Err(GameError::NotInteractable(_))
    ));
}

#[test]
fn spiders_circle_their_spawn_point_and_reverse_on_boulders() {
    let mut game = Scenario::new()
        .place("player", 9, 9)
        .place("spider", 3, 3)
        .build();
    let spider = find(&game, "spider");

    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (3, 2));
    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (4, 2));
    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (4, 3));

    // With a boulder on the ring, the orbit reverses instead.
    let mut game = Scenario::new()
        .place("player", 9, 9)
        .place("spider", 3, 3)
        .place("boulder", 4, 2)
        .build();
    let spider = find(&game, "spider");

    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (3, 2));
    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (2, 2));
}

#[test]
fn spiders_ignore_walls() {
    let mut game = Scenario::new()
        .place("player", 9, 9)
        .place("spider", 3, 3)
        .place("wall", 3, 2)
        .build();
    let spider = find(&game, "spider");

    let _ = game.tick();
    assert_eq!(position_of(&game, spider), (3, 2));
}

#[test]
fn replays_are_deterministic() {
    dungeon_test_utils::logging::init();
    let build = || {
        Scenario::new()
            .config(|config| {
                config.zombie_spawn_rate = 2;
                config.spider_spawn_rate = 3;
                config.rng_seed = 7;
            })
            .place("player", 0, 0)
            .place("zombie_toast_spawner", 4, 4)
            .place("mercenary", 8, 0)
            .place("treasure", 1, 0)
            .build()
    };
    let script = [
        Input::Move(Direction::Right),
        Input::Wait,
        Input::Move(Direction::Down),
        Input::Wait,
        Input::Wait,
        Input::Move(Direction::Left),
        Input::Wait,
        Input::Wait,
    ];
    assert_deterministic(build, &script);
}
