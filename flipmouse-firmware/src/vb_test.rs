use super::*;

#[test]
fn edge_encoding() {
    let e = VbEdge::new(5, Direction::Release);
    assert_eq!(e.as_byte(), 0x85);
    assert_eq!(e.vb(), 5);
    assert_eq!(e.direction(), Direction::Release);
    assert!(!e.is_press());

    let e = VbEdge::press(31);
    assert_eq!(e.as_byte(), 31);
    assert!(e.is_press());
    assert!(e.same_vb(VbEdge::release(31)));
    assert_eq!(VbEdge::from_byte(0x9f), VbEdge::release(31));
}

#[test]
fn directions() {
    assert!(Directions::BOTH.contains(Direction::Press));
    assert!(Directions::BOTH.contains(Direction::Release));
    assert!(!Directions::PRESS.contains(Direction::Release));
    assert_eq!(Directions::BOTH.without(Directions::PRESS), Directions::RELEASE);
    assert!(Directions::PRESS.without(Directions::PRESS).is_empty());
    assert!(!Directions::PRESS.intersects(Directions::RELEASE));

    let all: heapless::Vec<Direction, 2> = Directions::BOTH.iter().collect();
    assert_eq!(&all[..], &[Direction::Press, Direction::Release]);
    assert_eq!(Directions::RELEASE.iter().count(), 1);
}

#[test]
fn validity() {
    assert!(is_valid(0));
    assert!(is_valid(31));
    assert!(!is_valid(32));
    assert!(!is_valid(SINGLESHOT));
    assert_eq!(Direction::Press.opposite(), Direction::Release);
}
