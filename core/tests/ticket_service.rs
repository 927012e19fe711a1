//! End-to-end behaviour of `TicketService` over the in-memory repository.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

use std::sync::Arc;
use std::time::Duration;
use ticketing_core::{
    CreateTicket, Database, TicketDto, TicketError, TicketId, TicketRepository, TicketService,
    TransactionHandle,
};
use ticketing_testing::helpers::{init_test_tracing, sample_ticket};
use ticketing_testing::{Fault, InMemoryTicketRepository};

fn setup() -> (InMemoryTicketRepository, TicketService<InMemoryTicketRepository>) {
    init_test_tracing();
    let repository = InMemoryTicketRepository::new();
    let service = TicketService::new(repository.clone());
    (repository, service)
}

async fn create(service: &TicketService<InMemoryTicketRepository>, allocation: i32) -> TicketId {
    let dto = service.create(sample_ticket(allocation)).await.unwrap();
    TicketId::new(dto.id)
}

#[tokio::test]
async fn create_returns_projection_with_assigned_id() {
    let (_, service) = setup();

    let dto = service.create(sample_ticket(100)).await.unwrap();

    assert_eq!(
        dto,
        TicketDto {
            id: 1,
            name: "example".to_string(),
            description: "sample description".to_string(),
            allocation: 100,
        }
    );
}

#[tokio::test]
async fn create_rejects_invalid_fields_without_storing() {
    let (repository, service) = setup();

    let err = service
        .create(CreateTicket {
            name: String::new(),
            description: "d".to_string(),
            allocation: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::ValidationFailed { field: "name", .. }));

    let err = service.create(sample_ticket(-1)).await.unwrap_err();
    assert!(matches!(
        err,
        TicketError::ValidationFailed {
            field: "allocation",
            ..
        }
    ));

    assert!(repository.is_empty());
}

#[tokio::test]
async fn create_accepts_zero_allocation() {
    let (_, service) = setup();
    let dto = service.create(sample_ticket(0)).await.unwrap();
    assert_eq!(dto.allocation, 0);
}

#[tokio::test]
async fn create_reports_storage_failure() {
    let (repository, service) = setup();
    repository.inject(Fault::Create);

    let err = service.create(sample_ticket(10)).await.unwrap_err();
    assert!(matches!(err, TicketError::PersistenceFailure(_)));
}

#[tokio::test]
async fn find_by_id_returns_stored_ticket() {
    let (_, service) = setup();
    let id = create(&service, 100).await;

    let dto = service.find_by_id(id).await.unwrap();
    assert_eq!(dto.id, id.get());
    assert_eq!(dto.allocation, 100);
}

#[tokio::test]
async fn find_by_id_unknown_is_not_found() {
    let (_, service) = setup();
    let err = service.find_by_id(TicketId::new(999)).await.unwrap_err();
    assert_eq!(err, TicketError::TicketNotFound(TicketId::new(999)));
}

#[tokio::test]
async fn find_by_id_hides_soft_deleted() {
    let (repository, service) = setup();
    let id = create(&service, 100).await;
    repository.soft_delete(id);

    assert!(matches!(
        service.find_by_id(id).await,
        Err(TicketError::TicketNotFound(_))
    ));
    assert!(matches!(
        service.decrement_allocation(id, 1).await,
        Err(TicketError::TicketNotFound(_))
    ));
}

#[tokio::test]
async fn purchase_decrements_and_commits() {
    let (repository, service) = setup();
    let id = create(&service, 100).await;

    service.decrement_allocation(id, 10).await.unwrap();

    assert_eq!(service.find_by_id(id).await.unwrap().allocation, 90);
    assert_eq!(repository.commits(), 1);
    assert_eq!(repository.rollbacks(), 0);
}

#[tokio::test]
async fn purchase_of_entire_allocation_leaves_zero() {
    let (_, service) = setup();
    let id = create(&service, 5).await;

    service.decrement_allocation(id, 5).await.unwrap();

    assert_eq!(service.find_by_id(id).await.unwrap().allocation, 0);
}

#[tokio::test]
async fn oversized_purchase_rolls_back_and_keeps_allocation() {
    let (repository, service) = setup();
    let id = create(&service, 100).await;
    service.decrement_allocation(id, 10).await.unwrap();

    let err = service.decrement_allocation(id, 1000).await.unwrap_err();

    assert_eq!(
        err,
        TicketError::InsufficientAllocation {
            requested: 1000,
            available: 90,
        }
    );
    assert_eq!(repository.allocation_of(id), Some(90));
    assert_eq!(repository.rollbacks(), 1);
}

#[tokio::test]
async fn purchase_from_sold_out_ticket_fails() {
    let (_, service) = setup();
    let id = create(&service, 0).await;

    let err = service.decrement_allocation(id, 1).await.unwrap_err();
    assert_eq!(
        err,
        TicketError::InsufficientAllocation {
            requested: 1,
            available: 0,
        }
    );
}

#[tokio::test]
async fn purchase_of_unknown_ticket_rolls_back() {
    let (repository, service) = setup();

    let err = service
        .decrement_allocation(TicketId::new(999), 1)
        .await
        .unwrap_err();

    assert_eq!(err, TicketError::TicketNotFound(TicketId::new(999)));
    assert_eq!(repository.rollbacks(), 1);
    assert_eq!(repository.commits(), 0);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;

    for amount in [0, -5] {
        let err = service.decrement_allocation(id, amount).await.unwrap_err();
        assert!(matches!(
            err,
            TicketError::ValidationFailed { field: "amount", .. }
        ));
    }
    assert_eq!(repository.allocation_of(id), Some(10));
}

#[tokio::test]
async fn begin_failure_is_returned_without_rollback() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    repository.inject(Fault::Begin);

    let err = service.decrement_allocation(id, 1).await.unwrap_err();

    assert!(matches!(err, TicketError::PersistenceFailure(_)));
    assert_eq!(repository.rollbacks(), 0);
    assert_eq!(repository.allocation_of(id), Some(10));
}

#[tokio::test]
async fn update_failure_rolls_back() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    repository.inject(Fault::Update);

    let err = service.decrement_allocation(id, 1).await.unwrap_err();

    assert!(matches!(err, TicketError::PersistenceFailure(_)));
    assert_eq!(repository.rollbacks(), 1);
    assert_eq!(repository.allocation_of(id), Some(10));
}

#[tokio::test]
async fn commit_failure_is_returned_and_nothing_is_applied() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    repository.inject(Fault::Commit);

    let err = service.decrement_allocation(id, 1).await.unwrap_err();

    assert!(matches!(err, TicketError::PersistenceFailure(_)));
    assert_eq!(repository.commits(), 0);
    assert_eq!(repository.allocation_of(id), Some(10));
}

#[tokio::test]
async fn rollback_failure_does_not_mask_original_error() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    repository.inject(Fault::Rollback);

    let err = service.decrement_allocation(id, 50).await.unwrap_err();

    assert_eq!(
        err,
        TicketError::InsufficientAllocation {
            requested: 50,
            available: 10,
        }
    );
    assert_eq!(repository.allocation_of(id), Some(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_oversell() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    let service = Arc::new(service);

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.decrement_allocation(id, 6).await }
    });
    let second = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.decrement_allocation(id, 6).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(TicketError::InsufficientAllocation {
            requested: 6,
            available: 4,
        })
    )));
    assert_eq!(repository.allocation_of(id), Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_purchases_sell_exactly_the_allocation() {
    let (repository, service) = setup();
    let id = create(&service, 25).await;
    let service = Arc::new(service);

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.decrement_allocation(id, 1).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(err) => assert!(matches!(err, TicketError::InsufficientAllocation { .. })),
        }
    }

    assert_eq!(succeeded, 25);
    assert_eq!(repository.allocation_of(id), Some(0));
    assert_eq!(repository.commits(), 25);
}

#[tokio::test]
async fn cancelled_purchase_releases_lock_without_writing() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;

    // Hold the row lock so the purchase parks inside its transaction.
    let blocker = {
        let mut tx = repository.database().begin().await.unwrap();
        repository.find_by_id_for_update(id, &mut tx).await.unwrap();
        tx
    };

    let purchase = tokio::time::timeout(
        Duration::from_millis(50),
        service.decrement_allocation(id, 3),
    )
    .await;
    assert!(purchase.is_err(), "purchase should still be waiting on the lock");
    assert_eq!(repository.abandoned(), 1);

    blocker.rollback().await.unwrap();

    service.decrement_allocation(id, 3).await.unwrap();
    assert_eq!(repository.allocation_of(id), Some(7));
}

#[tokio::test]
async fn purchase_past_its_deadline_rolls_back_before_failing() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    let service = service.with_purchase_timeout(Duration::from_millis(50));

    let blocker = {
        let mut tx = repository.database().begin().await.unwrap();
        repository.find_by_id_for_update(id, &mut tx).await.unwrap();
        tx
    };

    let err = service.decrement_allocation(id, 3).await.unwrap_err();
    assert!(matches!(err, TicketError::PersistenceFailure(ref msg) if msg.contains("deadline")));
    assert_eq!(repository.rollbacks(), 1);
    assert_eq!(repository.abandoned(), 0);

    blocker.rollback().await.unwrap();

    service.decrement_allocation(id, 3).await.unwrap();
    assert_eq!(repository.allocation_of(id), Some(7));
}

#[tokio::test]
async fn purchase_within_its_deadline_commits() {
    let (repository, service) = setup();
    let id = create(&service, 10).await;
    let service = service.with_purchase_timeout(Duration::from_secs(5));

    service.decrement_allocation(id, 4).await.unwrap();

    assert_eq!(repository.allocation_of(id), Some(6));
    assert_eq!(repository.rollbacks(), 0);
}

mod rollback_metrics {
    use super::*;
    use metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use ticketing_core::telemetry;

    /// Records only the rollback counter.
    #[derive(Default)]
    struct RollbackRecorder(Arc<AtomicU64>);

    struct Tally(Arc<AtomicU64>);

    impl CounterFn for Tally {
        fn increment(&self, value: u64) {
            self.0.fetch_add(value, Ordering::SeqCst);
        }

        fn absolute(&self, value: u64) {
            self.0.store(value, Ordering::SeqCst);
        }
    }

    impl RollbackRecorder {
        fn count(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl Recorder for RollbackRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == telemetry::ROLLBACKS {
                Counter::from_arc(Arc::new(Tally(Arc::clone(&self.0))))
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn only_successful_rollbacks_are_counted() {
        let (repository, service) = setup();
        let id = tokio_test::block_on(create(&service, 10));
        let recorder = RollbackRecorder::default();

        repository.inject(Fault::Update);
        repository.inject(Fault::Rollback);
        let failed = metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(service.decrement_allocation(id, 1))
        });
        assert!(failed.is_err());
        assert_eq!(recorder.count(), 0);

        repository.clear_faults();
        repository.inject(Fault::Update);
        let failed = metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(service.decrement_allocation(id, 1))
        });
        assert!(failed.is_err());
        assert_eq!(recorder.count(), 1);
        assert_eq!(repository.allocation_of(id), Some(10));
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use ticketing_testing::properties::{allocation, create_ticket};

    proptest! {
        #[test]
        fn created_tickets_echo_their_input(request in create_ticket()) {
            let (_, service) = setup();

            let dto = tokio_test::block_on(service.create(request.clone())).unwrap();

            prop_assert_eq!(dto.name, request.name);
            prop_assert_eq!(dto.description, request.description);
            prop_assert_eq!(dto.allocation, request.allocation);
        }

        #[test]
        fn purchase_succeeds_iff_amount_fits(available in allocation(), amount in -5..=10_050i32) {
            let (repository, service) = setup();

            let outcome = tokio_test::block_on(async {
                let id = create(&service, available).await;
                (id, service.decrement_allocation(id, amount).await)
            });
            let (id, result) = outcome;

            if amount > 0 && amount <= available {
                prop_assert!(result.is_ok());
                prop_assert_eq!(repository.allocation_of(id), Some(available - amount));
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(repository.allocation_of(id), Some(available));
            }
        }
    }
}
