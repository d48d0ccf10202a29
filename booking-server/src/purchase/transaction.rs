//! The purchase flow: hold capacity, take payment, confirm or release.
//!
//! 1. The order is validated without any lock.
//! 2. Under the connection lock the sale window and capacity are checked
//!    and the purchase rows are inserted as `Pending`. Check and insert
//!    happen in the same critical section, so concurrent buyers cannot both
//!    take the last seat.
//! 3. A checkout session is created. If that fails the held rows are
//!    removed again before the error is returned.
//! 4. The provider calls back: success confirms the purchase, failure
//!    expires the session and removes every row the purchase created.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::availability::Availability;
use crate::config::BookingConfig;
use crate::domain::{
    Bus, Connection, ConnectionId, InvalidParams, Money, Parcel, ParcelId, Passenger,
    PassengerId, PurchaseId, SessionId, Ticket, TicketId, Volume,
    free_allowance_per_unoccupied_seat,
};
use crate::ledger::{PurchaseRecord, PurchaseState, ReservationLedger};
use crate::payment::{CallbackSigner, CallbackToken, CheckoutSession, PaymentGateway};
use crate::store::{BookingStore, SessionLocator};

use super::error::{CapacityConflict, PurchaseError};
use super::order::{ParcelOrder, TicketOrder};
use super::pricing::ticket_price;

/// Path under which the provider's return URLs are mounted.
pub const RETURN_PATH: &str = "/payments";

/// A callback can arrive before the session it names has been bound.
const SESSION_LOOKUP_ATTEMPTS: u32 = 5;
const SESSION_LOOKUP_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

/// What the customer needs to go and pay.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub purchase: PurchaseId,
    pub connection: ConnectionId,
    pub session_id: SessionId,
    pub redirect_url: String,
    pub amount: Money,
    pub tickets: Vec<TicketId>,
    pub parcels: Vec<ParcelId>,
}

/// A purchase held under the lock, not yet handed to the provider.
struct Held {
    purchase: PurchaseId,
    amount: Money,
    tickets: Vec<TicketId>,
    parcels: Vec<ParcelId>,
}

/// Orchestrates purchases against a store and a payment provider.
pub struct PurchaseTransaction<'a, S, G> {
    store: &'a S,
    gateway: &'a G,
    config: &'a BookingConfig,
    signer: CallbackSigner,
}

impl<'a, S: BookingStore, G: PaymentGateway> PurchaseTransaction<'a, S, G> {
    pub fn new(store: &'a S, gateway: &'a G, config: &'a BookingConfig) -> Self {
        let signer = CallbackSigner::new(
            config.payment.callback_secret.as_bytes(),
            config.payment.token_ttl(),
        );
        Self {
            store,
            gateway,
            config,
            signer,
        }
    }

    /// Hold seats for every passenger in `order` and start checkout.
    pub async fn purchase_tickets(
        &self,
        connection: &ConnectionId,
        order: &TicketOrder,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        order.validate(self.config)?;
        let prices = self.config.luggage_prices;

        let held = self
            .store
            .with_connection(connection, |conn, bus, ledger| -> Result<Held, PurchaseError> {
                check_on_sale(conn, now)?;
                order.check_route(&conn.route)?;
                let availability = Availability::compute(&bus.capacity(), ledger);
                check_seats(order, bus, ledger, &availability)?;
                check_ticket_volume(order, &availability)?;

                let pick_up = order.pick_up.to_address();
                let drop_off = order.drop_off.to_address();
                let mut passengers = Vec::with_capacity(order.passengers.len());
                let mut tickets = Vec::with_capacity(order.passengers.len());
                for p in &order.passengers {
                    let passenger = Passenger {
                        id: PassengerId::new(),
                        first_name: p.first_name.trim().to_string(),
                        last_name: p.last_name.trim().to_string(),
                    };
                    let price = ticket_price(conn.price, &p.luggage, &prices).ok_or_else(|| {
                        InvalidParams::single("passengers", "price out of range")
                    })?;
                    tickets.push(Ticket {
                        id: TicketId::new(),
                        connection: conn.id,
                        seat: p.seat,
                        passenger: passenger.id,
                        pick_up: pick_up.id,
                        drop_off: drop_off.id,
                        contact: order.contact.clone(),
                        luggage_volume: p.luggage.volume(),
                        luggage: p.luggage.clone(),
                        price,
                    });
                    passengers.push(passenger);
                }

                let amount = sum(tickets.iter().map(|t| t.price))?;
                let record = PurchaseRecord::pending(
                    PurchaseId::new(),
                    tickets,
                    Vec::new(),
                    passengers,
                    vec![pick_up, drop_off],
                    amount,
                    now,
                );
                Ok(hold(ledger, record))
            })
            .await??;

        info!(
            connection = %connection,
            purchase = %held.purchase,
            seats = held.tickets.len(),
            amount = held.amount.minor(),
            "tickets held"
        );
        self.checkout(connection, held, now).await
    }

    /// Hold luggage volume for a parcel and start checkout.
    pub async fn purchase_parcel(
        &self,
        connection: &ConnectionId,
        order: &ParcelOrder,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        order.validate(self.config)?;
        let price = self.config.tariff.price(&order.dimensions);

        let held = self
            .store
            .with_connection(connection, |conn, bus, ledger| -> Result<Held, PurchaseError> {
                check_on_sale(conn, now)?;
                order.check_route(&conn.route)?;
                let availability = Availability::compute(&bus.capacity(), ledger);
                let volume = order.dimensions.volume();
                if !availability.fits_volume(volume) {
                    return Err(PurchaseError::from(CapacityConflict::NotEnoughVolume {
                        requested: volume,
                        left: availability.luggage_volume_left,
                    }));
                }

                let pick_up = order.pick_up.to_address();
                let drop_off = order.drop_off.to_address();
                let parcel = Parcel {
                    id: ParcelId::new(),
                    connection: conn.id,
                    kind: order.kind,
                    dimensions: order.dimensions,
                    weight_grams: order.weight_grams,
                    sender: order.sender.clone(),
                    receiver: order.receiver.clone(),
                    pick_up: pick_up.id,
                    drop_off: drop_off.id,
                    luggage_volume: volume,
                    price,
                };
                let record = PurchaseRecord::pending(
                    PurchaseId::new(),
                    Vec::new(),
                    vec![parcel],
                    Vec::new(),
                    vec![pick_up, drop_off],
                    price,
                    now,
                );
                Ok(hold(ledger, record))
            })
            .await??;

        info!(
            connection = %connection,
            purchase = %held.purchase,
            amount = held.amount.minor(),
            "parcel held"
        );
        self.checkout(connection, held, now).await
    }

    /// Mark a purchase paid after the provider reports success.
    ///
    /// Returns `false` if it had already been confirmed.
    pub async fn confirm(
        &self,
        session: &SessionId,
        token: &CallbackToken,
        now: DateTime<Utc>,
    ) -> Result<bool, PurchaseError> {
        let locator = self.authorize(session, token, now).await?;
        let confirmed = self
            .store
            .with_connection(&locator.connection, |_, _, ledger| {
                ledger.confirm(&locator.purchase, now)
            })
            .await?
            .ok_or(PurchaseError::UnknownSession)?;

        if confirmed {
            info!(
                connection = %locator.connection,
                purchase = %locator.purchase,
                session = %session,
                "purchase confirmed"
            );
        }
        Ok(confirmed)
    }

    /// Release a purchase after the provider reports failure.
    ///
    /// The provider session is expired first. If that fails nothing is
    /// released, since the customer might still be able to pay.
    pub async fn cancel(
        &self,
        session: &SessionId,
        token: &CallbackToken,
        now: DateTime<Utc>,
    ) -> Result<PurchaseRecord, PurchaseError> {
        let locator = self.authorize(session, token, now).await?;
        let state = self
            .store
            .with_connection(&locator.connection, |_, _, ledger| {
                ledger.get(&locator.purchase).map(|r| r.state)
            })
            .await?;
        match state {
            None => return Err(PurchaseError::UnknownSession),
            Some(PurchaseState::Confirmed) => return Err(PurchaseError::AlreadyConfirmed),
            Some(PurchaseState::Pending) => {}
        }

        self.gateway
            .cancel_payment_intent(session)
            .await
            .map_err(|err| {
                warn!(session = %session, error = %err, "failed to expire checkout session");
                PurchaseError::PaymentGateway(err)
            })?;

        let record = self
            .store
            .with_connection(&locator.connection, |_, _, ledger| {
                // Re-check under the lock: a success callback may have won the race.
                match ledger.get(&locator.purchase).map(|r| r.state) {
                    Some(PurchaseState::Pending) => Ok(ledger.remove(&locator.purchase)),
                    Some(PurchaseState::Confirmed) => Err(PurchaseError::AlreadyConfirmed),
                    None => Ok(None),
                }
            })
            .await??
            .ok_or(PurchaseError::UnknownSession)?;
        self.store.forget_session(session).await?;

        info!(
            connection = %locator.connection,
            purchase = %locator.purchase,
            session = %session,
            tickets = record.tickets.len(),
            parcels = record.parcels.len(),
            "purchase cancelled, capacity released"
        );
        Ok(record)
    }

    /// Check the callback token and find the purchase it belongs to.
    async fn authorize(
        &self,
        session: &SessionId,
        token: &CallbackToken,
        now: DateTime<Utc>,
    ) -> Result<SessionLocator, PurchaseError> {
        let purchase = self
            .signer
            .verify(token, now)
            .map_err(|_| PurchaseError::Unauthorized)?;
        let locator = self.locate_session(session).await?;
        if locator.purchase != purchase {
            warn!(session = %session, "callback token issued for a different purchase");
            return Err(PurchaseError::Unauthorized);
        }
        Ok(locator)
    }

    /// Look a session up, waiting briefly for a checkout still being bound.
    async fn locate_session(&self, session: &SessionId) -> Result<SessionLocator, PurchaseError> {
        for attempt in 1..=SESSION_LOOKUP_ATTEMPTS {
            if let Some(locator) = self.store.locate_session(session).await? {
                return Ok(locator);
            }
            if attempt < SESSION_LOOKUP_ATTEMPTS {
                tokio::time::sleep(SESSION_LOOKUP_BACKOFF).await;
            }
        }
        Err(PurchaseError::UnknownSession)
    }

    /// Create the checkout session for a held purchase, or release it.
    async fn checkout(
        &self,
        connection: &ConnectionId,
        held: Held,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let session = match self.start_session(&held, now).await {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    connection = %connection,
                    purchase = %held.purchase,
                    error = %err,
                    "checkout failed, releasing held capacity"
                );
                self.release(connection, &held.purchase).await?;
                return Err(err);
            }
        };

        let purchase = held.purchase;
        self.store
            .bind_session(
                session.session_id.clone(),
                SessionLocator {
                    connection: *connection,
                    purchase,
                },
            )
            .await?;
        let session_id = session.session_id.clone();
        self.store
            .with_connection(connection, |_, _, ledger| {
                ledger.bind_session(&purchase, session_id)
            })
            .await?;

        Ok(PurchaseReceipt {
            purchase,
            connection: *connection,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
            amount: held.amount,
            tickets: held.tickets,
            parcels: held.parcels,
        })
    }

    async fn start_session(
        &self,
        held: &Held,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, PurchaseError> {
        let token = self
            .signer
            .issue(held.purchase, now)
            .map_err(PurchaseError::PaymentGateway)?;
        let expires_at = now + self.config.payment.session_ttl();
        self.gateway
            .create_checkout_session(held.amount, RETURN_PATH, &token, expires_at)
            .await
            .map_err(PurchaseError::PaymentGateway)
    }

    async fn release(
        &self,
        connection: &ConnectionId,
        purchase: &PurchaseId,
    ) -> Result<(), PurchaseError> {
        self.store
            .with_connection(connection, |_, _, ledger| {
                ledger.remove(purchase);
            })
            .await?;
        Ok(())
    }
}

fn check_on_sale(connection: &Connection, now: DateTime<Utc>) -> Result<(), PurchaseError> {
    let status = connection.status();
    if !status.is_open_for_sale() {
        return Err(PurchaseError::SaleClosed(status));
    }
    if !connection.is_on_sale_at(now) {
        return Err(PurchaseError::ExpiredSale);
    }
    Ok(())
}

fn check_seats(
    order: &TicketOrder,
    bus: &Bus,
    ledger: &ReservationLedger,
    availability: &Availability,
) -> Result<(), CapacityConflict> {
    let requested = order.party();
    if !availability.fits_party(requested) {
        return Err(CapacityConflict::NotEnoughSeats {
            requested,
            left: availability.seats_left,
        });
    }

    let taken = ledger.taken_seats();
    for passenger in &order.passengers {
        if !bus.has_passenger_seat(&passenger.seat) {
            return Err(CapacityConflict::UnknownSeat(passenger.seat));
        }
        if taken.contains(&passenger.seat) {
            return Err(CapacityConflict::SeatTaken(passenger.seat));
        }
    }
    Ok(())
}

/// Luggage beyond the seats' reserved allowance must fit in what is left.
fn check_ticket_volume(
    order: &TicketOrder,
    availability: &Availability,
) -> Result<(), CapacityConflict> {
    let declared: Volume = order.passengers.iter().map(|p| p.luggage.volume()).sum();
    let reserved = free_allowance_per_unoccupied_seat()
        .cm3()
        .saturating_mul(u64::from(order.party()));
    let extra = Volume::from_cm3(declared.cm3().saturating_sub(reserved));
    if !availability.fits_volume(extra) {
        return Err(CapacityConflict::NotEnoughVolume {
            requested: extra,
            left: availability.luggage_volume_left,
        });
    }
    Ok(())
}

fn sum(prices: impl Iterator<Item = Money>) -> Result<Money, PurchaseError> {
    let mut total = Money::ZERO;
    for price in prices {
        total = total.checked_add(price).ok_or_else(|| {
            PurchaseError::Validation(InvalidParams::single(
                "passengers",
                "total price out of range",
            ))
        })?;
    }
    Ok(total)
}

fn hold(ledger: &mut ReservationLedger, record: PurchaseRecord) -> Held {
    let held = Held {
        purchase: record.id,
        amount: record.amount,
        tickets: record.tickets.iter().map(|t| t.id).collect(),
        parcels: record.parcels.iter().map(|p| p.id).collect(),
    };
    ledger.insert(record);
    held
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::domain::{
        BoxDimensions, ConnectionStatus, ConnectionUpdate, LuggageDeclaration, SeatId,
    };
    use crate::payment::{MockGateway, PaymentError};
    use crate::purchase::order::fixtures::{parcel_order, ticket_order};
    use crate::search::fixtures::{World, date, kyiv};
    use crate::store::memory_fixtures::connection;
    use crate::store::{BookingStore, MemoryStore};

    struct Fixture {
        world: World,
        gateway: MockGateway,
        connection: ConnectionId,
        now: DateTime<Utc>,
    }

    impl Fixture {
        async fn new(seats: u16, luggage_cm3: u64) -> Self {
            let world = World::new(seats, luggage_cm3).await;
            let departure = kyiv(date(2025, 6, 10), 9, 0);
            let connection = world.add(departure).await;
            Self {
                world,
                gateway: MockGateway::new(),
                connection,
                now: departure - Duration::days(3),
            }
        }

        fn tx(&self) -> PurchaseTransaction<'_, MemoryStore, MockGateway> {
            PurchaseTransaction::new(&self.world.store, &self.gateway, &self.world.config)
        }

        fn seat(&self, n: usize) -> SeatId {
            // seats[0] is the crew seat.
            self.world.bus.seats[n].id
        }

        async fn availability(&self) -> Availability {
            self.world
                .store
                .connection(&self.connection)
                .await
                .unwrap()
                .unwrap()
                .availability
        }

        async fn token(&self) -> CallbackToken {
            self.gateway.checkouts().await.last().unwrap().token.clone()
        }
    }

    fn large() -> LuggageDeclaration {
        LuggageDeclaration {
            large: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ticket_purchase_holds_seats_and_starts_checkout() {
        let f = Fixture::new(5, 2_000_000).await;
        let order = ticket_order(&[f.seat(1), f.seat(2)], large());

        let receipt = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap();

        assert_eq!(receipt.tickets.len(), 2);
        // 2 * (4500 fare + 7000 large bag)
        assert_eq!(receipt.amount, Money::from_minor(23_000));
        assert_eq!(f.availability().await.seats_left, 3);

        let checkouts = f.gateway.checkouts().await;
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].amount, receipt.amount);
        assert_eq!(checkouts[0].return_path, RETURN_PATH);
        assert_eq!(
            f.world.store.locate_session(&receipt.session_id).await.unwrap(),
            Some(SessionLocator {
                connection: f.connection,
                purchase: receipt.purchase
            })
        );
    }

    #[tokio::test]
    async fn taken_seat_is_a_conflict() {
        let f = Fixture::new(5, 2_000_000).await;
        let tx = f.tx();
        let first = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        tx.purchase_tickets(&f.connection, &first, f.now).await.unwrap();

        let second = ticket_order(&[f.seat(2), f.seat(1)], LuggageDeclaration::default());
        let err = tx
            .purchase_tickets(&f.connection, &second, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::CapacityConflict(CapacityConflict::SeatTaken(seat)) if seat == f.seat(1)
        ));
        // Nothing from the failed order is held.
        assert_eq!(f.availability().await.seats_left, 4);
    }

    #[tokio::test]
    async fn crew_seat_and_foreign_seats_are_unknown() {
        let f = Fixture::new(5, 2_000_000).await;
        for seat in [f.seat(0), SeatId::new()] {
            let order = ticket_order(&[seat], LuggageDeclaration::default());
            let err = f
                .tx()
                .purchase_tickets(&f.connection, &order, f.now)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                PurchaseError::CapacityConflict(CapacityConflict::UnknownSeat(_))
            ));
        }
    }

    #[tokio::test]
    async fn party_larger_than_seats_left() {
        let f = Fixture::new(2, 2_000_000).await;
        let order = ticket_order(
            &[f.seat(1), f.seat(2), SeatId::new()],
            LuggageDeclaration::default(),
        );
        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::CapacityConflict(CapacityConflict::NotEnoughSeats {
                requested: 3,
                left: 2
            })
        ));
    }

    #[tokio::test]
    async fn expired_sale_checked_before_capacity() {
        let f = Fixture::new(1, 2_000_000).await;
        let sell_before = f
            .world
            .store
            .connection(&f.connection)
            .await
            .unwrap()
            .unwrap()
            .connection
            .sell_before;
        let order = ticket_order(&[SeatId::new(), SeatId::new()], LuggageDeclaration::default());

        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, sell_before)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ExpiredSale));
    }

    #[tokio::test]
    async fn cancelled_connection_is_closed_for_sale() {
        let world = World::new(4, 2_000_000).await;
        let departure = kyiv(date(2025, 6, 10), 9, 0);
        let mut c = connection(&world.bus, world.route, departure);
        c.record(ConnectionUpdate {
            status: ConnectionStatus::Canceled,
            at: departure - Duration::days(10),
            comment: "driver shortage".to_string(),
        })
        .unwrap();
        let id = c.id;
        world.store.insert_connection(c).await.unwrap();

        let gateway = MockGateway::new();
        let tx = PurchaseTransaction::new(&world.store, &gateway, &world.config);
        let order = ticket_order(&[world.bus.seats[1].id], LuggageDeclaration::default());
        let err = tx
            .purchase_tickets(&id, &order, departure - Duration::days(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::SaleClosed(ConnectionStatus::Canceled)
        ));
    }

    #[tokio::test]
    async fn unknown_connection() {
        let f = Fixture::new(2, 2_000_000).await;
        let order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        let err = f
            .tx()
            .purchase_tickets(&ConnectionId::new(), &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ConnectionNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_order_never_touches_the_ledger() {
        let f = Fixture::new(2, 2_000_000).await;
        let mut order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        order.contact.phone = "call me".to_string();
        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::Validation(ref e) if e.contains("contact.phone")));
        assert_eq!(f.availability().await.seats_left, 2);
    }

    #[tokio::test]
    async fn gateway_failure_releases_everything() {
        let f = Fixture::new(3, 2_000_000).await;
        let before = f.availability().await;
        f.gateway.fail_checkout(true).await;

        let order = ticket_order(&[f.seat(1)], large());
        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::PaymentGateway(PaymentError::Declined(_))
        ));
        assert_eq!(f.availability().await, before);
    }

    #[tokio::test]
    async fn parcel_purchase_consumes_its_volume() {
        let f = Fixture::new(2, 500_000).await;
        let before = f.availability().await;
        let dims = BoxDimensions::new(25, 15, 18);

        let receipt = f
            .tx()
            .purchase_parcel(&f.connection, &parcel_order(dims), f.now)
            .await
            .unwrap();

        assert_eq!(receipt.amount, Money::from_minor(9000));
        assert_eq!(receipt.parcels.len(), 1);
        let after = f.availability().await;
        assert_eq!(
            before.luggage_volume_left.cm3() - after.luggage_volume_left.cm3(),
            dims.volume().cm3()
        );
        assert_eq!(after.seats_left, before.seats_left);
    }

    #[tokio::test]
    async fn parcel_larger_than_volume_left() {
        // 300_000 - 2 * 84_000 = 132_000 left.
        let f = Fixture::new(2, 300_000).await;
        let order = parcel_order(BoxDimensions::new(100, 100, 50));
        let err = f
            .tx()
            .purchase_parcel(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::CapacityConflict(CapacityConflict::NotEnoughVolume { .. })
        ));
    }

    #[tokio::test]
    async fn luggage_beyond_allowance_must_fit() {
        // One seat reserves 84_000 of 100_000; a large bag needs 116_000 more.
        let f = Fixture::new(1, 100_000).await;
        let order = ticket_order(&[f.seat(1)], large());
        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::CapacityConflict(CapacityConflict::NotEnoughVolume { .. })
        ));

        let light = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        assert!(
            f.tx()
                .purchase_tickets(&f.connection, &light, f.now)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn confirm_marks_paid_once() {
        let f = Fixture::new(3, 2_000_000).await;
        let tx = f.tx();
        let order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        let receipt = tx.purchase_tickets(&f.connection, &order, f.now).await.unwrap();
        let token = f.token().await;

        assert!(tx.confirm(&receipt.session_id, &token, f.now).await.unwrap());
        assert!(!tx.confirm(&receipt.session_id, &token, f.now).await.unwrap());

        let err = tx
            .cancel(&receipt.session_id, &token, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::AlreadyConfirmed));
        assert!(f.gateway.cancelled().await.is_empty());
        assert_eq!(f.availability().await.seats_left, 2);
    }

    #[tokio::test]
    async fn cancel_restores_availability_exactly() {
        let f = Fixture::new(4, 1_000_000).await;
        let tx = f.tx();
        let before = f.availability().await;

        let order = ticket_order(&[f.seat(1), f.seat(3)], large());
        let receipt = tx.purchase_tickets(&f.connection, &order, f.now).await.unwrap();
        let parcel = tx
            .purchase_parcel(
                &f.connection,
                &parcel_order(BoxDimensions::new(30, 20, 10)),
                f.now,
            )
            .await
            .unwrap();
        assert_ne!(f.availability().await, before);

        let ticket_token = f.gateway.checkouts().await[0].token.clone();
        let record = tx
            .cancel(&receipt.session_id, &ticket_token, f.now)
            .await
            .unwrap();
        assert_eq!(record.tickets.len(), 2);
        assert_eq!(record.passengers.len(), 2);
        assert_eq!(record.addresses.len(), 2);
        assert_eq!(record.stops.len(), 4);

        let parcel_token = f.token().await;
        tx.cancel(&parcel.session_id, &parcel_token, f.now)
            .await
            .unwrap();

        assert_eq!(f.availability().await, before);
        assert_eq!(
            f.gateway.cancelled().await,
            vec![receipt.session_id.clone(), parcel.session_id.clone()]
        );
        // The session is gone; a repeated callback finds nothing.
        let err = tx
            .cancel(&receipt.session_id, &ticket_token, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::UnknownSession));
    }

    #[tokio::test]
    async fn failed_provider_cancel_keeps_the_hold() {
        let f = Fixture::new(2, 1_000_000).await;
        let tx = f.tx();
        let order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        let receipt = tx.purchase_tickets(&f.connection, &order, f.now).await.unwrap();
        let token = f.token().await;

        f.gateway.fail_cancel(true).await;
        let err = tx
            .cancel(&receipt.session_id, &token, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::PaymentGateway(_)));
        assert_eq!(f.availability().await.seats_left, 1);

        f.gateway.fail_cancel(false).await;
        tx.cancel(&receipt.session_id, &token, f.now).await.unwrap();
        assert_eq!(f.availability().await.seats_left, 2);
    }

    #[tokio::test]
    async fn callbacks_require_matching_fresh_token() {
        let f = Fixture::new(3, 2_000_000).await;
        let tx = f.tx();
        let first = tx
            .purchase_tickets(
                &f.connection,
                &ticket_order(&[f.seat(1)], LuggageDeclaration::default()),
                f.now,
            )
            .await
            .unwrap();
        let first_token = f.token().await;
        tx.purchase_tickets(
            &f.connection,
            &ticket_order(&[f.seat(2)], LuggageDeclaration::default()),
            f.now,
        )
        .await
        .unwrap();
        let second_token = f.token().await;

        // Token of another purchase.
        let err = tx
            .confirm(&first.session_id, &second_token, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::Unauthorized));

        // Expired token: past the session lifetime and the grace period.
        let late = f.now + f.world.config.payment.token_ttl() + Duration::seconds(1);
        let err = tx
            .confirm(&first.session_id, &first_token, late)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::Unauthorized));

        // Unknown session.
        let err = tx
            .confirm(&SessionId::new("cs_nope").unwrap(), &first_token, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::UnknownSession));
    }

    #[tokio::test]
    async fn cancel_after_session_expiry_restores_seats() {
        let f = Fixture::new(3, 2_000_000).await;
        let tx = f.tx();
        let order = ticket_order(&[f.seat(1), f.seat(2)], LuggageDeclaration::default());
        let receipt = tx.purchase_tickets(&f.connection, &order, f.now).await.unwrap();
        assert_eq!(f.availability().await.seats_left, 1);

        let checkout = f.gateway.checkouts().await.pop().unwrap();
        assert_eq!(
            checkout.expires_at,
            f.now + f.world.config.payment.session_ttl()
        );

        // The provider reports the abandoned session once it has expired.
        let late = checkout.expires_at + Duration::minutes(1);
        let record = tx
            .cancel(&receipt.session_id, &checkout.token, late)
            .await
            .unwrap();
        assert_eq!(record.tickets.len(), 2);
        assert_eq!(f.availability().await.seats_left, 3);
    }

    #[tokio::test]
    async fn addresses_outside_the_route_are_rejected() {
        let f = Fixture::new(3, 2_000_000).await;
        let mut order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        std::mem::swap(&mut order.pick_up, &mut order.drop_off);

        let err = f
            .tx()
            .purchase_tickets(&f.connection, &order, f.now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::Validation(ref e)
                if e.contains("pick_up.country") && e.contains("drop_off.country")
        ));

        let mut parcel = parcel_order(BoxDimensions::new(20, 20, 20));
        parcel.pick_up = parcel.drop_off.clone();
        let err = f
            .tx()
            .purchase_parcel(&f.connection, &parcel, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::Validation(ref e) if e.contains("pick_up.country")));
        assert_eq!(f.availability().await.seats_left, 3);
        assert!(f.gateway.checkouts().await.is_empty());
    }

    #[tokio::test]
    async fn callback_waits_for_session_being_bound() {
        let f = Fixture::new(3, 2_000_000).await;
        let tx = f.tx();
        let order = ticket_order(&[f.seat(1)], LuggageDeclaration::default());
        let receipt = tx.purchase_tickets(&f.connection, &order, f.now).await.unwrap();
        let token = f.token().await;

        // Simulate a callback racing the end of checkout.
        f.world.store.forget_session(&receipt.session_id).await.unwrap();
        let store = f.world.store.clone();
        let session = receipt.session_id.clone();
        let locator = SessionLocator {
            connection: f.connection,
            purchase: receipt.purchase,
        };
        let binder = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            store.bind_session(session, locator).await.unwrap();
        });

        assert!(tx.confirm(&receipt.session_id, &token, f.now).await.unwrap());
        binder.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_purchases_never_overbook() {
        let f = Fixture::new(3, 2_000_000).await;
        let store = f.world.store.clone();
        let gateway = f.gateway.clone();
        let config = Arc::new(f.world.config.clone());
        let seats: Vec<SeatId> = (1..=3).map(|n| f.seat(n)).collect();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..12 {
            let store = store.clone();
            let gateway = gateway.clone();
            let config = config.clone();
            let connection = f.connection;
            let now = f.now;
            let order = ticket_order(&[seats[i % 3]], LuggageDeclaration::default());
            tasks.spawn(async move {
                let tx = PurchaseTransaction::new(&store, &gateway, &config);
                tx.purchase_tickets(&connection, &order, now).await
            });
        }

        let mut sold = 0;
        let mut conflicts = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => sold += 1,
                Err(PurchaseError::CapacityConflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(sold, 3);
        assert_eq!(conflicts, 9);
        let a = f.availability().await;
        assert_eq!(a.seats_left, 0);
        assert!(!a.overbooked);
    }
}
