use crate::fanout::{Sink, SinkId};
use switchboard_core::model::GroupMessage;
use tokio::sync::oneshot;

/// Операции над группой. Выполняются строго по очереди в цикле fanout.
pub(crate) enum FanoutCommand {
    /// Добавить подписчика. Повторная подписка того же sink ничего не меняет.
    Subscribe(Sink),

    /// Убрать подписчика. Неизвестный id игнорируется.
    Unsubscribe(SinkId),

    /// Разослать сообщение всем текущим подписчикам.
    /// `done` срабатывает, когда каждый подписчик принял сообщение (или истёк таймаут).
    Broadcast {
        message: GroupMessage,
        done: oneshot::Sender<()>,
    },

    /// Текущее число подписчиков.
    Count { reply: oneshot::Sender<usize> },
}
