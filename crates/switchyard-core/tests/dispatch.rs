//! Behaviour shared by both processors, exercised through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use switchyard_core::{
    ActionProcessor, Dispatch, DynResult, EventProcessor, Handle, Payload, Registry, RegistryExt, Verdict,
};
use switchyard_macros::Payload;

#[derive(Payload)]
#[payload(name = "unit.spawned")]
struct Spawned {
    id: u32,
}

#[derive(Payload)]
#[payload(name = "unit.hero_spawned")]
struct HeroSpawned {
    #[payload(parent)]
    unit: Spawned,
    title: &'static str,
}

#[derive(Payload)]
struct Despawned;

#[derive(Default)]
struct World {
    units: Vec<u32>,
    heroes: Vec<&'static str>,
}

fn wire<P: RegistryExt<World, DynResult>>(processor: &P) {
    processor
        .state_validator(|world: &World, spawned: &Spawned| {
            let fresh = !world.units.contains(&spawned.id);
            (fresh, DynResult::new(format!("unit {} exists", spawned.id)))
        })
        .unwrap();
    processor
        .on_state(|world: &mut World, spawned: &Spawned| world.units.push(spawned.id))
        .unwrap();
    processor
        .on_state(|world: &mut World, hero: &HeroSpawned| world.heroes.push(hero.title))
        .unwrap();
}

fn spawn_hero<P: Dispatch<World, DynResult>>(processor: &P, world: &mut World, id: u32) -> bool {
    let hero = HeroSpawned {
        unit: Spawned { id },
        title: "captain",
    };
    processor.process_with(world, &hero).unwrap().success
}

#[test]
fn test_derived_dispatch_behaves_the_same_for_both_processors() {
    let actions: ActionProcessor<World, DynResult> = ActionProcessor::new().with_derived_dispatch(true);
    let events: EventProcessor<World, DynResult> = EventProcessor::new().with_derived_dispatch(true);
    wire(&actions);
    wire(&events);

    let mut action_world = World::default();
    let mut event_world = World::default();

    assert!(spawn_hero(&actions, &mut action_world, 1));
    assert!(spawn_hero(&events, &mut event_world, 1));
    assert!(!spawn_hero(&actions, &mut action_world, 1));
    assert!(!spawn_hero(&events, &mut event_world, 1));

    for world in [&action_world, &event_world] {
        assert_eq!(world.units, vec![1]);
        assert_eq!(world.heroes, vec!["captain"]);
    }
}

#[test]
fn test_exact_dispatch_ignores_parent_tables() {
    let events: EventProcessor<World, DynResult> = EventProcessor::new();
    wire(&events);

    let mut world = World::default();
    assert!(spawn_hero(&events, &mut world, 4));
    assert!(world.units.is_empty());
    assert_eq!(world.heroes, vec!["captain"]);
}

#[test]
fn test_failure_result_reaches_typed_handlers() {
    let actions: ActionProcessor<World, DynResult> = ActionProcessor::new();
    wire(&actions);
    let reasons = Rc::new(RefCell::new(Vec::new()));

    let sink = reasons.clone();
    actions
        .on_failure_result(move |_: &Spawned, reason: &String| sink.borrow_mut().push(reason.clone()))
        .unwrap();

    let mut world = World::default();
    actions.process_with(&mut world, &Spawned { id: 9 }).unwrap();
    let outcome = actions.process_with(&mut world, &Spawned { id: 9 }).unwrap();

    assert!(outcome.handled);
    assert!(!outcome.success);
    assert_eq!(*reasons.borrow(), vec!["unit 9 exists".to_string()]);
}

#[test]
fn test_payload_names_come_from_attributes() {
    let hero = HeroSpawned {
        unit: Spawned { id: 1 },
        title: "scout",
    };
    let payload: &dyn Payload = &hero;
    assert_eq!(payload.payload_name(), "unit.hero_spawned");
    assert_eq!(payload.view::<Spawned>().map(Payload::payload_name), Some("unit.spawned"));
    assert!(!payload.is_a::<Despawned>());
}

struct Tally {
    seen: RefCell<Vec<(u32, bool)>>,
}

impl Handle<(), Spawned, bool> for Tally {
    fn handle(&self, _: &mut (), spawned: &Spawned, success: bool, _: &bool) -> Result<(), switchyard_core::BoxError> {
        self.seen.borrow_mut().push((spawned.id, success));
        Ok(())
    }
}

#[test]
fn test_handler_objects_see_every_verdict() {
    let events: EventProcessor<(), bool> = EventProcessor::new();
    let tally = Rc::new(Tally {
        seen: RefCell::new(Vec::new()),
    });

    events.validator(|spawned: &Spawned| spawned.id % 2 == 0).unwrap();
    events.handler_object::<Spawned, _>(&tally).unwrap();

    events.process(&Spawned { id: 2 }).unwrap();
    events.process(&Spawned { id: 3 }).unwrap();
    assert_eq!(*tally.seen.borrow(), vec![(2, true), (3, false)]);

    assert!(events.unregister_handler_object::<Spawned, _>(&tally).unwrap());
    assert!(!events.process(&Spawned { id: 4 }).unwrap().handled);
}

#[test]
fn test_validate_alone_runs_no_handlers() {
    let actions: ActionProcessor<(), u8> = ActionProcessor::new();
    let ran = Rc::new(RefCell::new(false));

    actions.validator(|_: &Despawned| (true, 5u8)).unwrap();
    let flag = ran.clone();
    actions.on(move |_: &Despawned| *flag.borrow_mut() = true).unwrap();

    assert_eq!(actions.validate(&(), &Despawned).unwrap(), Verdict::pass(5));
    assert!(!*ran.borrow());
}
