//! Scenario: admin actions move an order along exactly one edge.
//!
//! Walks both checkout flows end to end through the public API and checks
//! that no sequence of admin actions can skip a state, leave a terminal
//! state, or reach a status outside the closed set.

use kadai_lifecycle::{
    action_between, allowed_actions, next_status, tracking_is_live, AdminAction, CheckoutFlow,
    OrderQueue, OrderStatus,
};

fn walk(flow: CheckoutFlow, actions: &[AdminAction]) -> Vec<OrderStatus> {
    let mut st = flow.initial_status();
    let mut trail = vec![st];
    for a in actions {
        assert!(
            allowed_actions(st).contains(a),
            "{a} must be offered in {st}"
        );
        st = next_status(st, *a).expect("offered action must apply");
        trail.push(st);
    }
    trail
}

#[test]
fn payment_proof_flow_reaches_delivered() {
    let trail = walk(
        CheckoutFlow::PaymentProof,
        &[
            AdminAction::ApprovePayment,
            AdminAction::Approve,
            AdminAction::Dispatch,
            AdminAction::MarkDelivered,
        ],
    );
    assert_eq!(
        trail,
        vec![
            OrderStatus::AwaitingPaymentVerification,
            OrderStatus::Pending,
            OrderStatus::Approved,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ]
    );
    assert!(trail.last().unwrap().is_terminal());
}

#[test]
fn direct_flow_skips_payment_queue() {
    let first = CheckoutFlow::Direct.initial_status();
    assert!(!OrderQueue::Payments.matches(first));
    assert!(OrderQueue::Fulfillment.matches(first));

    let trail = walk(CheckoutFlow::Direct, &[AdminAction::Reject]);
    assert_eq!(trail.last(), Some(&OrderStatus::Rejected));
}

#[test]
fn payment_rejection_leaves_order_in_payment_queue() {
    let trail = walk(CheckoutFlow::PaymentProof, &[AdminAction::RejectPayment]);
    let last = *trail.last().unwrap();
    assert_eq!(last, OrderStatus::PaymentRejected);
    assert!(OrderQueue::Payments.matches(last));
    assert!(allowed_actions(last).is_empty());
}

#[test]
fn every_action_is_refused_outside_its_source_state() {
    for st in OrderStatus::ALL {
        for a in AdminAction::ALL {
            let res = next_status(st, a);
            if a.from_status() == st {
                assert_eq!(res, Ok(a.to_status()));
            } else {
                let err = res.unwrap_err();
                assert_eq!((err.from, err.action), (st, a));
            }
        }
    }
}

#[test]
fn only_table_edges_have_an_action() {
    let mut edges = 0;
    for from in OrderStatus::ALL {
        for to in OrderStatus::ALL {
            if let Some(a) = action_between(from, to) {
                assert_eq!((a.from_status(), a.to_status()), (from, to));
                edges += 1;
            }
        }
    }
    assert_eq!(edges, AdminAction::ALL.len());
}

#[test]
fn map_is_live_only_while_out_for_delivery() {
    let trail = walk(
        CheckoutFlow::Direct,
        &[
            AdminAction::Approve,
            AdminAction::Dispatch,
            AdminAction::MarkDelivered,
        ],
    );
    let live: Vec<bool> = trail.iter().map(|s| tracking_is_live(*s)).collect();
    assert_eq!(live, vec![false, false, true, false]);
}
