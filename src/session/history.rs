use crate::model::Exchange;

/// Conversation history, newest exchange first.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    exchanges: Vec<Exchange>,
}

impl ConversationHistory {
    pub fn prepend(&mut self, exchange: Exchange) {
        self.exchanges.insert(0, exchange);
    }

    pub fn as_slice(&self) -> &[Exchange] {
        &self.exchanges
    }
}
