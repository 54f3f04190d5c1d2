use arbor_core::{Aspect, ComponentKind, FixedClock};

#[test]
fn aspect_membership() {
    let aspect = Aspect::of(&[ComponentKind::Behavior, ComponentKind::Sprite]);

    assert!(aspect.includes(ComponentKind::Behavior));
    assert!(aspect.includes(ComponentKind::Sprite));
    assert!(!aspect.includes(ComponentKind::Audio));
    assert!(aspect.includes_all(Aspect::empty().with(ComponentKind::Sprite)));
    assert!(!aspect.includes_all(Aspect::empty().with(ComponentKind::Tile)));

    let kinds: Vec<_> = aspect.kinds().collect();
    assert_eq!(kinds, vec![ComponentKind::Behavior, ComponentKind::Sprite]);
}

#[test]
fn aspect_remove_clears_bit() {
    let mut aspect = Aspect::empty().with(ComponentKind::Behavior);
    aspect.remove(ComponentKind::Behavior);
    assert!(aspect.is_empty());
}

#[test]
fn fixed_clock_advances_tick_and_time() {
    let mut clock = FixedClock::new(0.5).starting_at(10.0);

    let first = clock.advance();
    let second = clock.advance();

    assert_eq!(first.tick, 0);
    assert_eq!(first.now, 10.0);
    assert_eq!(second.tick, 1);
    assert_eq!(second.now, 10.5);
    assert_eq!(second.elapsed_since(first.now), 0.5);
}
