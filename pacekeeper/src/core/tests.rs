use super::{Pacer, PacerConfig, PacerError, SessionCode, session_code};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn at(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

fn default_pacer(start_ms: u64) -> Pacer {
    Pacer::new(PacerConfig::default(), at(start_ms)).unwrap()
}

#[test]
fn test_first_request_is_free() {
    let mut pacer = default_pacer(1_000);

    let admission = pacer.admit(true, at(1_000)).unwrap();
    assert_eq!(admission.wait, Duration::ZERO);
    assert_eq!(admission.next_allowed_ms, 1_010);
}

#[test]
fn test_burst_scenario() {
    // grace 20000ms, unit 10ms, all calls at the same instant
    let mut pacer = default_pacer(0);

    let first = pacer.admit(true, at(0)).unwrap();
    assert_eq!(first.next_allowed_ms, 10);
    assert_eq!(first.wait, Duration::ZERO);

    let mut last = first;
    for _ in 1..2001 {
        last = pacer.admit(true, at(0)).unwrap();
    }
    assert_eq!(last.next_allowed_ms, 20_010);
    assert_eq!(last.wait, Duration::from_millis(10));
}

#[test]
fn test_burst_wait_grows_linearly() {
    let mut pacer = default_pacer(0);

    for n in 1..=2_500u64 {
        let admission = pacer.admit(true, at(0)).unwrap();
        let expected = (n * 10).saturating_sub(20_000);
        assert_eq!(admission.wait, Duration::from_millis(expected), "call {n}");
    }
}

#[test]
fn test_idle_period_resets_wait() {
    let mut pacer = default_pacer(0);

    // Build up a backlog well past the grace period
    for _ in 0..3_000 {
        pacer.admit(true, at(0)).unwrap();
    }
    assert!(pacer.admit(true, at(0)).unwrap().wait > Duration::ZERO);

    // Backlog is 30010ms; stay idle longer than backlog + grace
    let later = at(30_010 + 20_001);
    let admission = pacer.admit(true, later).unwrap();
    assert_eq!(admission.wait, Duration::ZERO);
}

#[test]
fn test_idle_time_is_not_banked() {
    let mut pacer = default_pacer(0);

    // A long idle stretch must not grant extra burst capacity
    let now = 1_000_000;
    for _ in 0..2_000 {
        pacer.admit(true, at(now)).unwrap();
    }
    let admission = pacer.admit(true, at(now)).unwrap();
    assert_eq!(admission.wait, Duration::from_millis(10));
}

#[test]
fn test_peek_does_not_consume() {
    let mut pacer = default_pacer(500);

    let before = pacer.next_allowed_ms();
    let peek = pacer.admit(false, at(500)).unwrap();
    assert_eq!(peek.next_allowed_ms, before);
    assert_eq!(peek.wait, Duration::ZERO);
}

#[test]
fn test_peek_snaps_deadline_forward() {
    let mut pacer = default_pacer(0);

    let peek = pacer.admit(false, at(5_000)).unwrap();
    assert_eq!(peek.next_allowed_ms, 5_000);
}

#[test]
fn test_deadline_never_rewinds() {
    let mut pacer = default_pacer(10_000);

    for _ in 0..100 {
        pacer.admit(true, at(10_000)).unwrap();
    }
    let deadline = pacer.next_allowed_ms();

    // A caller with an older clock must not move the deadline backwards
    let admission = pacer.admit(false, at(2_000)).unwrap();
    assert_eq!(admission.next_allowed_ms, deadline);
}

#[test]
fn test_monotonic_over_mixed_sequence() {
    let mut pacer = default_pacer(0);
    let mut previous = pacer.next_allowed_ms();

    // Interleave consuming calls and peeks with a jittery clock
    let times = [0u64, 5, 3, 40, 40, 39, 100, 20, 25_000, 24_000, 60_000];
    for (i, t) in times.iter().cycle().take(200).enumerate() {
        let admission = pacer.admit(i % 3 != 0, at(*t)).unwrap();
        assert!(admission.next_allowed_ms >= previous);
        previous = admission.next_allowed_ms;
    }
}

#[test]
fn test_backlog() {
    let mut pacer = default_pacer(0);
    for _ in 0..5 {
        pacer.admit(true, at(0)).unwrap();
    }

    assert_eq!(pacer.backlog(at(0)).unwrap(), Duration::from_millis(50));
    assert_eq!(pacer.backlog(at(30)).unwrap(), Duration::from_millis(20));
    assert_eq!(pacer.backlog(at(1_000)).unwrap(), Duration::ZERO);
}

#[test]
fn test_invalid_config() {
    let config = PacerConfig {
        unit_cost: Duration::from_micros(500),
        grace_period: Duration::from_secs(1),
    };
    assert!(matches!(
        Pacer::new(config, at(0)),
        Err(PacerError::InvalidConfig(_))
    ));
}

#[test]
fn test_sub_millisecond_durations_rejected() {
    let fractional_cost = PacerConfig {
        unit_cost: Duration::from_micros(1_500),
        grace_period: Duration::from_secs(1),
    };
    assert!(matches!(
        fractional_cost.validate(),
        Err(PacerError::InvalidConfig(msg)) if msg.contains("unit cost")
    ));

    let fractional_grace = PacerConfig {
        unit_cost: Duration::from_millis(10),
        grace_period: Duration::from_nanos(20_000_000_001),
    };
    assert!(matches!(
        Pacer::new(fractional_grace, at(0)),
        Err(PacerError::InvalidConfig(msg)) if msg.contains("grace period")
    ));

    assert!(PacerConfig::default().validate().is_ok());
}

#[test]
fn test_zero_grace_period_waits_immediately() {
    let config = PacerConfig {
        unit_cost: Duration::from_millis(100),
        grace_period: Duration::ZERO,
    };
    let mut pacer = Pacer::new(config, at(0)).unwrap();

    assert_eq!(pacer.admit(true, at(0)).unwrap().wait, Duration::from_millis(100));
    assert_eq!(pacer.admit(true, at(0)).unwrap().wait, Duration::from_millis(200));
}

#[test]
fn test_clock_before_epoch() {
    let mut pacer = default_pacer(0);
    let before_epoch = UNIX_EPOCH - Duration::from_secs(1);

    assert_eq!(
        pacer.admit(true, before_epoch),
        Err(PacerError::ClockBeforeEpoch)
    );
}

#[test]
fn test_session_code_boundaries() {
    assert_eq!(session_code(at(0)).unwrap().as_str(), "AAAA");
    assert_eq!(session_code(at(12 * 3_600_000)).unwrap().as_str(), "NAAA");
    // Last millisecond of the day maps to the last code
    assert_eq!(session_code(at(86_399_999)).unwrap().as_str(), "ZZZZ");
    // Wraps at midnight
    assert_eq!(session_code(at(86_400_000)).unwrap().as_str(), "AAAA");
}

#[test]
fn test_session_code_is_deterministic_and_ordered() {
    let a = session_code(at(1_700_000_000_000)).unwrap();
    let b = session_code(at(1_700_000_000_000)).unwrap();
    assert_eq!(a, b);

    // About 189ms per code: a full second later is a different code
    let c = session_code(at(1_700_000_001_000)).unwrap();
    assert_ne!(a, c);
    assert!(a.as_str() < c.as_str());
}

#[test]
fn test_session_code_shape() {
    for offset in (0..86_400_000u64).step_by(7_777_777) {
        let code = session_code(at(offset)).unwrap();
        assert_eq!(code.as_str().len(), 4);
        assert!(code.as_str().bytes().all(|b| b.is_ascii_uppercase()));
    }
}

#[test]
fn test_session_code_parse() {
    assert_eq!(SessionCode::parse("abcd").unwrap().as_str(), "ABCD");
    assert_eq!("QwEr".parse::<SessionCode>().unwrap().to_string(), "QWER");

    assert!(SessionCode::parse("ABC").is_err());
    assert!(SessionCode::parse("ABCDE").is_err());
    assert!(SessionCode::parse("AB1D").is_err());
    assert!(SessionCode::parse("ÄBCD").is_err());
}
