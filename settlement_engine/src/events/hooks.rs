use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    NotificationEvent,
    OrderAnnulledEvent,
    OrderCreatedEvent,
    OrderPaidEvent,
    OrderSettledEvent,
    OrderShippedEvent,
    WithdrawalResolvedEvent,
};

/// Declares the hook, handler and producer sets for every engine event in one place.
macro_rules! event_hooks {
    ($($hook:ident, $producer:ident, $publish:ident : $event:ty);+ $(;)?) => {
        /// Publishing side of the event system. Cloned into every engine API.
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producer: Vec<EventProducer<$event>>,)+
        }

        pub struct EventHandlers {
            $(pub $hook: Option<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self {
                    $($hook: hooks.$hook.map(|f| EventHandler::new(buffer_size, f)),)+
                }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    if let Some(handler) = &self.$hook {
                        result.$producer.push(handler.subscribe());
                    }
                )+
                result
            }

            /// Spawns every configured handler. The handlers run until all producers are dropped.
            pub async fn start_handlers(self) {
                $(
                    if let Some(handler) = self.$hook {
                        tokio::spawn(async move {
                            handler.start_handler().await;
                        });
                    }
                )+
            }
        }

        #[derive(Default, Clone)]
        pub struct EventHooks {
            $(pub $hook: Option<Handler<$event>>,)+
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
                    self.$hook = Some(Arc::new(f));
                    self
                }
            )+
        }

        impl EventProducers {
            $(
                pub async fn $publish(&self, event: $event) {
                    for producer in &self.$producer {
                        producer.publish_event(event.clone()).await;
                    }
                }
            )+
        }
    };
}

event_hooks! {
    on_order_created, order_created_producer, publish_order_created: OrderCreatedEvent;
    on_order_paid, order_paid_producer, publish_order_paid: OrderPaidEvent;
    on_order_annulled, order_annulled_producer, publish_order_annulled: OrderAnnulledEvent;
    on_order_shipped, order_shipped_producer, publish_order_shipped: OrderShippedEvent;
    on_order_settled, order_settled_producer, publish_order_settled: OrderSettledEvent;
    on_withdrawal_resolved, withdrawal_resolved_producer, publish_withdrawal_resolved: WithdrawalResolvedEvent;
    on_notification, notification_producer, publish_notification: NotificationEvent;
}
