//! [`ChatPlatform`] implementation over the Bot API.

use filerelay_relay::{
    ChatFuture, ChatPlatform, DownloadStream, FileRef, NotifyError, RelayError, StatusMessage,
};

use crate::client::BotClient;

impl ChatPlatform for BotClient {
    fn open_download<'a>(&'a self, file: &'a FileRef) -> ChatFuture<'a, DownloadStream, RelayError> {
        Box::pin(async move {
            let source = |e: crate::TelegramError| RelayError::SourceTransport(e.to_string());
            let resolved = self.get_file(&file.id).await.map_err(source)?;
            self.download(&resolved).await.map_err(source)
        })
    }

    fn create_status_message<'a>(
        &'a self,
        chat_id: i64,
        reply_to: i64,
        text: &'a str,
    ) -> ChatFuture<'a, StatusMessage, NotifyError> {
        Box::pin(async move {
            let sent = self
                .send_message(chat_id, text, Some(reply_to))
                .await
                .map_err(|e| NotifyError(e.to_string()))?;
            Ok(StatusMessage {
                chat_id: sent.chat.id,
                message_id: sent.message_id,
            })
        })
    }

    fn notify<'a>(&'a self, status: &'a StatusMessage, text: &'a str) -> ChatFuture<'a, (), NotifyError> {
        Box::pin(async move {
            self.edit_message_text(status.chat_id, status.message_id, text)
                .await
                .map_err(|e| NotifyError(e.to_string()))
        })
    }
}
