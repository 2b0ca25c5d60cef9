use std::sync::Arc;

use super::common::*;
use crate::workflows::reconciliation::cascade::{
    transition, CascadeEvent, CascadeState, CascadingResolver, EMPTY_ADDRESS2_DETAIL,
};
use crate::workflows::reconciliation::domain::{
    AddressField, ChangeStatus, RawAddressRow, RecordKey, ResolvedAddress, Strategy,
};
use crate::workflows::reconciliation::normalizer::normalize;

fn zip_resolution(city: &str, state: &str, zip_code: &str) -> ResolvedAddress {
    ResolvedAddress::from_zip(zip(city, state, zip_code))
}

#[test]
fn start_always_moves_to_zip_lookup() {
    let original = sf_original();
    let next = transition(CascadeState::Start, &original, CascadeEvent::Begin);
    assert_eq!(next, CascadeState::ZipLookup);
}

#[test]
fn clean_zip_match_resolves_without_record() {
    let original = sf_original();
    let next = transition(
        CascadeState::ZipLookup,
        &original,
        CascadeEvent::Verified(zip_resolution("SAN FRANCISCO", "CA", "94107")),
    );

    match next {
        CascadeState::Resolved(resolution) => {
            assert!(resolution.status.changed_fields().is_empty());
            assert!(!resolution.is_recordable());
        }
        other => panic!("expected resolved state, got {other:?}"),
    }
}

#[test]
fn zip_city_change_resolves_at_zip_lookup() {
    let original = sf_original();
    let next = transition(
        CascadeState::ZipLookup,
        &original,
        CascadeEvent::Verified(zip_resolution("SF", "CA", "94107")),
    );

    match next {
        CascadeState::Resolved(resolution) => {
            assert!(resolution.is_recordable());
            assert_eq!(resolution.status.summary(), "Zipcode lookup: City changed");
        }
        other => panic!("expected resolved state, got {other:?}"),
    }
}

#[test]
fn zip_state_change_forces_address1_lookup() {
    let original = sf_original();
    let next = transition(
        CascadeState::ZipLookup,
        &original,
        CascadeEvent::Verified(zip_resolution("San Francisco", "NY", "94107")),
    );
    assert_eq!(next, CascadeState::Address1Lookup);

    let with_city = transition(
        CascadeState::ZipLookup,
        &original,
        CascadeEvent::Verified(zip_resolution("Brooklyn", "ny", "11201")),
    );
    assert_eq!(with_city, CascadeState::Address1Lookup);
}

#[test]
fn failures_fall_through_each_stage() {
    let original = sf_original();
    let after_zip = transition(
        CascadeState::ZipLookup,
        &original,
        CascadeEvent::Failed(not_found("m1")),
    );
    assert_eq!(after_zip, CascadeState::Address1Lookup);

    let after_address1 = transition(after_zip, &original, CascadeEvent::Failed(not_found("m2")));
    assert_eq!(after_address1, CascadeState::Address2Lookup);

    let after_address2 = transition(
        after_address1,
        &original,
        CascadeEvent::Failed(not_found("m3")),
    );
    assert_eq!(after_address2, CascadeState::Exhausted(ChangeStatus::error("m3")));
}

#[test]
fn terminal_states_ignore_further_events() {
    let original = sf_original();
    let exhausted = CascadeState::Exhausted(ChangeStatus::error("m3"));
    let next = transition(
        exhausted.clone(),
        &original,
        CascadeEvent::Verified(zip_resolution("SF", "CA", "94107")),
    );
    assert_eq!(next, exhausted);

    let resolved = transition(
        CascadeState::Address1Lookup,
        &original,
        CascadeEvent::Verified(ResolvedAddress::from_street(
            street("322 3RD ST", "SAN FRANCISCO", "CA", "94107"),
            Strategy::Address1Lookup,
        )),
    );
    assert!(resolved.is_terminal());
    assert_eq!(
        transition(resolved.clone(), &original, CascadeEvent::Begin),
        resolved
    );
}

#[test]
fn mismatched_events_leave_state_unchanged() {
    let original = sf_original();
    assert_eq!(
        transition(CascadeState::ZipLookup, &original, CascadeEvent::Begin),
        CascadeState::ZipLookup
    );
    assert_eq!(
        transition(
            CascadeState::Start,
            &original,
            CascadeEvent::Failed(not_found("early"))
        ),
        CascadeState::Start
    );
}

#[tokio::test]
async fn resolver_stops_at_clean_zip_match() {
    let verifier = Arc::new(
        ScriptedVerifier::default().with_zip("94107", Ok(zip("SAN FRANCISCO", "CA", "94107"))),
    );
    let resolver = CascadingResolver::new(verifier.clone());
    let original = sf_original();

    let result = resolver.resolve(&original).await;

    assert_eq!(result.attempted, vec![Strategy::ZipLookup]);
    assert_eq!(verifier.calls(), vec![VerifierCall::Zip("94107".to_string())]);
    assert!(result.into_outcome(original).is_none());
}

#[tokio::test]
async fn resolver_rechecks_street_when_zip_flips_state() {
    let verifier = Arc::new(
        ScriptedVerifier::default()
            .with_zip("94107", Ok(zip("San Francisco", "NY", "94107")))
            .with_street(
                "322 3rd St",
                Ok(street("322 3RD ST", "SAN FRANCISCO", "CA", "94107-1234")),
            ),
    );
    let resolver = CascadingResolver::new(verifier.clone());
    let original = sf_original();

    let result = resolver.resolve(&original).await;
    assert_eq!(
        result.attempted,
        vec![Strategy::ZipLookup, Strategy::Address1Lookup]
    );

    let outcome = result.into_outcome(original).expect("address 1 resolution is recorded");
    assert_eq!(outcome.strategy(), Some(Strategy::Address1Lookup));
    assert!(outcome.status.changed_fields().is_empty());
    assert_eq!(outcome.status.summary(), "Address 1 lookup: no fields changed");

    match &verifier.calls()[1] {
        VerifierCall::Address(query) => {
            assert_eq!(query.street1, "322 3rd St");
            assert!(query.street2.is_empty());
            assert_eq!(query.city, "San Francisco");
            assert_eq!(query.zip, "94107");
        }
        other => panic!("expected address lookup, got {other:?}"),
    }
}

#[tokio::test]
async fn resolver_uses_address2_as_street_line() {
    let verifier = Arc::new(ScriptedVerifier::default().with_street(
        "Apt 2",
        Ok(street("APT 2", "SAN FRANCISCO", "CA", "94107")),
    ));
    let resolver = CascadingResolver::new(verifier.clone());
    let original = sf_original();

    let result = resolver.resolve(&original).await;
    assert_eq!(result.attempted, Strategy::ordered().to_vec());

    let outcome = result.into_outcome(original).expect("address 2 resolution is recorded");
    let resolved = outcome.resolved.as_ref().expect("resolved address present");
    assert!(resolved.address1.is_none());
    assert_eq!(resolved.address2.as_deref(), Some("APT 2"));
    assert_eq!(outcome.status.summary(), "Address 2 lookup: no fields changed");
}

#[tokio::test]
async fn exhausted_cascade_reports_only_last_failure() {
    let verifier = Arc::new(
        ScriptedVerifier::default()
            .with_zip("94107", Err(not_found("m1")))
            .with_street("322 3rd St", Err(not_found("m2")))
            .with_street("Apt 2", Err(not_found("m3"))),
    );
    let resolver = CascadingResolver::new(verifier.clone());
    let original = sf_original();

    let result = resolver.resolve(&original).await;
    assert!(result.is_exhausted());
    assert_eq!(verifier.calls().len(), 3);

    let outcome = result.into_outcome(original).expect("errors are recorded");
    assert!(outcome.resolved.is_none());
    assert!(outcome.status.is_error());
    assert_eq!(outcome.status.error_detail(), Some("m3"));
}

#[tokio::test]
async fn missing_address2_exhausts_without_a_third_call() {
    let verifier = Arc::new(ScriptedVerifier::default());
    let resolver = CascadingResolver::new(verifier.clone());
    let original = normalize(RawAddressRow {
        key: RecordKey::new("INV-9", "SOLD-9"),
        address1: Some("1 Nowhere Rd".to_string()),
        address2: None,
        city: Some("Ames".to_string()),
        state: Some("IA".to_string()),
        zip: Some("50010".to_string()),
    })
    .expect("fixture is well formed");

    let result = resolver.resolve(&original).await;
    assert_eq!(verifier.calls().len(), 2);
    let outcome = result.into_outcome(original).expect("errors are recorded");
    assert_eq!(outcome.status.error_detail(), Some(EMPTY_ADDRESS2_DETAIL));
}

#[tokio::test]
async fn zip_lookup_uses_first_five_characters() {
    let verifier = Arc::new(
        ScriptedVerifier::default().with_zip("94107", Ok(zip("SAN FRANCISCO", "CA", "94107"))),
    );
    let resolver = CascadingResolver::new(verifier.clone());
    let mut row = sf_row("INV-2");
    row.zip = Some("94107-1234".to_string());
    let original = normalize(row).expect("fixture is well formed");

    let result = resolver.resolve(&original).await;
    assert_eq!(verifier.calls(), vec![VerifierCall::Zip("94107".to_string())]);
    assert!(!result.is_exhausted());
    match result.terminal {
        CascadeState::Resolved(resolution) => {
            assert!(!resolution.status.contains(AddressField::Zip));
        }
        other => panic!("expected resolved state, got {other:?}"),
    }
}
