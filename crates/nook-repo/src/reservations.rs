use nook_types::{EntityId, Reservation, ReservationPatch, ReservationStatus};

use crate::error::Result;
use crate::repository::Repository;

impl Repository<Reservation> {
    /// Reservations of one listing, in insertion order.
    pub async fn for_listing(&self, listing_id: &EntityId) -> Result<Vec<Reservation>> {
        self.find(|r| &r.listing_id == listing_id).await
    }

    /// Move a reservation to `status`.
    pub async fn set_status(
        &self,
        id: &EntityId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        self.update(
            id,
            ReservationPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;
    use chrono::NaiveDate;
    use nook_store::KeyedStore;
    use nook_types::{MonotonicClock, ReservationDraft};
    use std::sync::Arc;

    fn reservations() -> Repository<Reservation> {
        Repository::new(
            Arc::new(KeyedStore::in_memory()),
            Arc::new(MonotonicClock::new()),
        )
        .unwrap()
    }

    fn draft(listing: &str) -> ReservationDraft {
        ReservationDraft {
            listing_id: EntityId::parse(listing).unwrap(),
            guest_name: "Guest".into(),
            guest_email: "guest@x.com".into(),
            check_in: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            guests: 2,
        }
    }

    #[tokio::test]
    async fn new_reservations_are_pending() {
        let repo = reservations();
        let r = repo.create(draft("l1")).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.nights(), 3);
    }

    #[tokio::test]
    async fn for_listing_filters_by_listing() {
        let repo = reservations();
        let a = repo.create(draft("l1")).await.unwrap();
        repo.create(draft("l2")).await.unwrap();
        let c = repo.create(draft("l1")).await.unwrap();

        let l1 = EntityId::parse("l1").unwrap();
        assert_eq!(repo.for_listing(&l1).await.unwrap(), vec![a, c]);
    }

    #[tokio::test]
    async fn set_status_persists() {
        let repo = reservations();
        let r = repo.create(draft("l1")).await.unwrap();
        let confirmed = repo
            .set_status(&r.id, ReservationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
        assert_eq!(
            repo.get_by_id(&r.id).await.unwrap().unwrap().status,
            ReservationStatus::Confirmed
        );

        let missing = EntityId::parse("nope").unwrap();
        let err = repo
            .set_status(&missing, ReservationStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
    }

    #[tokio::test]
    async fn check_out_must_follow_check_in() {
        let repo = reservations();
        let mut bad = draft("l1");
        bad.check_out = bad.check_in;
        let err = repo.create(bad).await.unwrap_err();
        assert!(matches!(err, RepoError::Invalid { .. }));
    }
}
