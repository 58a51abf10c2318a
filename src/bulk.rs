//! Bulk Auto-Processor
//!
//! One pass over every restaurant queue. Pending orders due today are either expired or sent to
//! the kitchen, depending on how much time is left before delivery.

use jiff::{SignedDuration, civil::DateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, instrument};

use crate::{
    orders::{
        Order,
        status::{Action, OrderStatus},
    },
    queue::ScanOutcome,
    session::{OrderError, Session},
    store::Store,
};

/// Counts from one bulk pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Orders queued across all restaurants when the pass started
    pub queued_total: usize,

    /// Pending orders due on the same day as `now`
    pub candidates: usize,

    /// Orders that changed state
    pub processed: usize,

    /// Orders that went to the kitchen
    pub preparing: usize,

    /// Orders that expired and were refunded
    pub rejected: usize,
}

impl BulkReport {
    /// Processed orders as a percentage of the queued total, to two decimals.
    pub fn processed_percentage(&self) -> Decimal {
        let mut percentage = if self.queued_total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(self.processed) * Decimal::ONE_HUNDRED / Decimal::from(self.queued_total))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        percentage.rescale(2);

        percentage
    }
}

/// The bulk action for a pending order, or `None` if it is not due on `now`'s day.
pub fn bulk_action(order: &Order, now: DateTime, cutoff: SignedDuration) -> Option<Action> {
    if order.status() != OrderStatus::Pending || order.delivery_at().date() != now.date() {
        return None;
    }

    if now.duration_until(order.delivery_at()) < cutoff {
        Some(Action::BulkExpire)
    } else {
        Some(Action::BulkRetain)
    }
}

impl<S: Store> Session<S> {
    /// Expire or retain every pending order due on `now`'s day, across all restaurants.
    ///
    /// `now` is used for every order of the pass. Each queue is scanned once, so no order is
    /// visited twice and a second pass finds nothing left to do.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if orders changed but could not be saved.
    #[instrument(skip(self))]
    pub fn bulk_process(&mut self, now: DateTime) -> Result<BulkReport, OrderError> {
        let mut report = BulkReport {
            queued_total: self.queued_total(),
            ..BulkReport::default()
        };

        let cutoff = self.settings.expiry_cutoff;

        let Session {
            catalog,
            orders,
            queues,
            ledger,
            ..
        } = self;

        for (restaurant, _) in catalog.restaurants() {
            let Some(queue) = queues.get_mut(restaurant) else {
                continue;
            };

            queue.scan(|key| {
                let Some(order) = orders.get_mut(key) else {
                    return ScanOutcome::Drop;
                };

                let Some(action) = bulk_action(order, now, cutoff) else {
                    return ScanOutcome::Requeue;
                };

                report.candidates += 1;

                let transition = match order.apply(action) {
                    Ok(transition) => transition,
                    Err(err) => {
                        debug!(order = %order.id(), error = %err, "bulk transition refused");
                        return ScanOutcome::Requeue;
                    }
                };

                report.processed += 1;

                if transition.enters_ledger() {
                    ledger.push(key);
                    report.rejected += 1;
                } else {
                    report.preparing += 1;
                }

                debug!(order = %order.id(), to = %transition.to, "bulk processed order");

                if transition.leaves_queue() {
                    ScanOutcome::Drop
                } else {
                    ScanOutcome::Requeue
                }
            });
        }

        info!(
            queued = report.queued_total,
            candidates = report.candidates,
            processed = report.processed,
            preparing = report.preparing,
            rejected = report.rejected,
            "bulk pass finished"
        );

        if report.processed > 0 {
            self.persist()?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        catalog::Catalog,
        orders::{ItemEntry, OrderId},
        pricing::amount,
        session::{OrderDraft, Settings},
        store::MemoryStore,
    };

    use super::*;

    fn session() -> TestResult<Session<MemoryStore>> {
        let mut catalog = Catalog::new();

        let barn = catalog
            .add_restaurant("R001", "Burger Barn", "hello@barn.test")
            .ok_or("R001")?;

        catalog.add_food_item(barn, "Fries", "Salted", amount(300));
        catalog.add_customer("Amy", "amy@example.com");

        Ok(Session::open(catalog, Settings::default(), MemoryStore::new())?)
    }

    fn place(session: &mut Session<MemoryStore>, delivery_at: DateTime) -> TestResult<OrderId> {
        let draft = OrderDraft {
            customer_email: "amy@example.com".to_string(),
            restaurant_id: "R001".to_string(),
            delivery_at,
            delivery_address: "1 High Street".to_string(),
            items: vec![ItemEntry::new("Fries", 1)],
            special_request: None,
            offer_code: None,
            payment: None,
        };

        Ok(session.create_order(draft, date(2026, 3, 1).at(8, 0, 0, 0))?)
    }

    #[test]
    fn order_due_in_thirty_minutes_expires() -> TestResult {
        let mut session = session()?;
        let now = date(2026, 3, 1).at(12, 0, 0, 0);

        let soon = place(&mut session, date(2026, 3, 1).at(12, 30, 0, 0))?;
        let later = place(&mut session, date(2026, 3, 1).at(13, 0, 0, 0))?;
        let tomorrow = place(&mut session, date(2026, 3, 2).at(12, 10, 0, 0))?;

        let report = session.bulk_process(now)?;

        assert_eq!(
            report,
            BulkReport {
                queued_total: 3,
                candidates: 2,
                processed: 2,
                preparing: 1,
                rejected: 1,
            }
        );
        assert_eq!(report.processed_percentage(), Decimal::new(6667, 2));

        assert_eq!(session.order(soon).map(Order::status), Some(OrderStatus::Rejected));
        assert_eq!(session.order(later).map(Order::status), Some(OrderStatus::Preparing));
        assert_eq!(session.order(tomorrow).map(Order::status), Some(OrderStatus::Pending));

        assert_eq!(session.refunds().into_iter().map(Order::id).collect::<Vec<_>>(), vec![soon]);
        assert_eq!(
            session.queued_orders("R001")?.into_iter().map(Order::id).collect::<Vec<_>>(),
            vec![later, tomorrow]
        );

        Ok(())
    }

    #[test]
    fn second_pass_processes_nothing() -> TestResult {
        let mut session = session()?;
        let now = date(2026, 3, 1).at(12, 0, 0, 0);

        place(&mut session, date(2026, 3, 1).at(12, 30, 0, 0))?;
        place(&mut session, date(2026, 3, 1).at(18, 0, 0, 0))?;

        session.bulk_process(now)?;

        let saves = session.store().save_count();
        let again = session.bulk_process(now)?;

        assert_eq!(again.processed, 0);
        assert_eq!(again.candidates, 0);
        assert_eq!(again.queued_total, 1);
        assert_eq!(session.refunds().len(), 1);
        assert_eq!(session.store().save_count(), saves);

        Ok(())
    }

    #[test]
    fn empty_queues_report_zero_percent() -> TestResult {
        let mut session = session()?;

        let report = session.bulk_process(date(2026, 3, 1).at(12, 0, 0, 0))?;

        assert_eq!(report, BulkReport::default());
        assert_eq!(report.processed_percentage(), Decimal::ZERO);
        assert_eq!(report.processed_percentage().to_string(), "0.00");

        Ok(())
    }

    #[test]
    fn percentage_always_has_two_decimals() {
        let whole = BulkReport {
            queued_total: 5,
            processed: 2,
            ..BulkReport::default()
        };
        let third = BulkReport {
            queued_total: 3,
            processed: 1,
            ..BulkReport::default()
        };

        assert_eq!(whole.processed_percentage().to_string(), "40.00");
        assert_eq!(third.processed_percentage().to_string(), "33.33");
    }

    #[test]
    fn cutoff_boundary_retains_the_order() -> TestResult {
        let mut session = session()?;

        let exactly = place(&mut session, date(2026, 3, 1).at(13, 0, 0, 0))?;
        let overdue = place(&mut session, date(2026, 3, 1).at(11, 0, 0, 0))?;

        session.bulk_process(date(2026, 3, 1).at(12, 0, 0, 0))?;

        assert_eq!(session.order(exactly).map(Order::status), Some(OrderStatus::Preparing));
        assert_eq!(session.order(overdue).map(Order::status), Some(OrderStatus::Rejected));

        Ok(())
    }
}
