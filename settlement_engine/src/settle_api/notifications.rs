//! In-app notification messages for order and payout events.
use serde_json::json;

use crate::{
    db_types::{NewNotification, Order, OrderStatusType, Transaction},
    ledger_objects::{Settlement, WithdrawalResolution},
};

/// Seller and buyer notifications for a newly paid order.
pub fn payment_confirmed(order: &Order) -> [NewNotification; 2] {
    let data = json!({ "order_id": order.id, "order_number": order.order_number });
    [
        NewNotification::new(
            order.seller_id,
            "sale",
            "Nova venda!",
            format!("Você vendeu o pedido {}. Prepare o envio!", order.order_number),
        )
        .with_data(data.clone()),
        NewNotification::new(
            order.buyer_id,
            "order",
            "Pagamento confirmado!",
            format!("Seu pedido {} foi confirmado.", order.order_number),
        )
        .with_data(data),
    ]
}

pub fn order_shipped(order: &Order) -> NewNotification {
    let code = order.tracking_code.as_deref().unwrap_or_default();
    NewNotification::new(
        order.buyer_id,
        "shipping",
        "Pedido enviado!",
        format!("Seu pedido {} foi enviado. Código: {code}", order.order_number),
    )
    .with_data(json!({ "order_id": order.id, "tracking_code": code }))
}

pub fn order_delivered(order: &Order) -> NewNotification {
    NewNotification::new(
        order.seller_id,
        "delivery",
        "Pedido entregue!",
        format!("O pedido {} foi entregue ao comprador.", order.order_number),
    )
    .with_data(json!({ "order_id": order.id }))
}

pub fn order_annulled(order: &Order) -> NewNotification {
    let (title, message) = match order.status {
        OrderStatusType::PaymentFailed => {
            ("Pagamento recusado", format!("O pagamento do pedido {} foi recusado.", order.order_number))
        },
        OrderStatusType::Refunded => ("Pedido reembolsado", format!("O pedido {} foi reembolsado.", order.order_number)),
        OrderStatusType::Chargeback => {
            ("Pagamento contestado", format!("O pagamento do pedido {} foi contestado.", order.order_number))
        },
        _ => ("Pedido cancelado", format!("O pedido {} foi cancelado.", order.order_number)),
    };
    NewNotification::new(order.buyer_id, "order", title, message)
        .with_data(json!({ "order_id": order.id, "status": order.status }))
}

pub fn order_settled(settlement: &Settlement) -> Vec<NewNotification> {
    let order = &settlement.order;
    let mut result = vec![NewNotification::new(
        order.seller_id,
        "settlement",
        "Pagamento liberado!",
        format!("{} do pedido {} foram liberados no seu saldo.", settlement.sale.amount, order.order_number),
    )
    .with_data(json!({ "order_id": order.id, "amount": settlement.sale.amount }))];
    if let Some(cashback) = &settlement.cashback {
        result.push(
            NewNotification::new(
                order.buyer_id,
                "settlement",
                "Cashback recebido!",
                format!("Você ganhou {} de cashback no pedido {}.", cashback.amount, order.order_number),
            )
            .with_data(json!({ "order_id": order.id, "amount": cashback.amount })),
        );
    }
    result
}

pub fn withdrawal_resolved(resolution: &WithdrawalResolution) -> NewNotification {
    let w: &Transaction = &resolution.withdrawal;
    let amount = -w.amount;
    let (title, message) = if resolution.is_approved() {
        ("Saque aprovado", format!("Seu saque de {amount} foi aprovado."))
    } else {
        ("Saque recusado", format!("Seu saque de {amount} foi recusado e o valor voltou para o seu saldo."))
    };
    NewNotification::new(w.user_id, "withdrawal", title, message).with_data(json!({ "withdrawal_id": w.id }))
}
