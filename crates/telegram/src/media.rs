//! Media selection for inbound messages.

use filerelay_relay::{FileRef, InboundMessage};

use crate::types::Message;

/// Returns the file to relay from `message`, if it carries media.
///
/// Precedence: document, photo (largest size), video, audio, voice.
/// Media without a declared name get one derived from their unique id.
pub fn file_handle(message: &Message) -> Option<FileRef> {
    if let Some(doc) = &message.document {
        return Some(FileRef {
            id: doc.file_id.clone(),
            declared_name: doc
                .file_name
                .clone()
                .unwrap_or_else(|| format!("document_{}", doc.file_unique_id)),
            declared_size: doc.file_size,
        });
    }
    if let Some(photo) = message
        .photo
        .iter()
        .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file_size))
    {
        return Some(FileRef {
            id: photo.file_id.clone(),
            declared_name: format!("photo_{}.jpg", photo.file_unique_id),
            declared_size: photo.file_size,
        });
    }
    if let Some(video) = &message.video {
        return Some(FileRef {
            id: video.file_id.clone(),
            declared_name: video
                .file_name
                .clone()
                .unwrap_or_else(|| format!("video_{}.mp4", video.file_unique_id)),
            declared_size: video.file_size,
        });
    }
    if let Some(audio) = &message.audio {
        return Some(FileRef {
            id: audio.file_id.clone(),
            declared_name: audio
                .file_name
                .clone()
                .unwrap_or_else(|| format!("audio_{}.mp3", audio.file_unique_id)),
            declared_size: audio.file_size,
        });
    }
    message.voice.as_ref().map(|voice| FileRef {
        id: voice.file_id.clone(),
        declared_name: format!("voice_{}.ogg", voice.file_unique_id),
        declared_size: voice.file_size,
    })
}

/// Converts a Bot API message into the relay's view of it.
pub fn inbound(message: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: message.chat.id,
        message_id: message.message_id,
        file: file_handle(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Message {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn document_keeps_its_name() {
        let msg = parse(
            r#"{"message_id":1,"chat":{"id":2},
                "document":{"file_id":"D","file_unique_id":"ud","file_name":"report.pdf","file_size":900}}"#,
        );
        let file = file_handle(&msg).unwrap();
        assert_eq!(file.id, "D");
        assert_eq!(file.declared_name, "report.pdf");
        assert_eq!(file.declared_size, Some(900));
    }

    #[test]
    fn largest_photo_wins() {
        let msg = parse(
            r#"{"message_id":1,"chat":{"id":2},"photo":[
                {"file_id":"S","file_unique_id":"us","width":90,"height":90,"file_size":1000},
                {"file_id":"L","file_unique_id":"ul","width":1280,"height":960,"file_size":90000},
                {"file_id":"M","file_unique_id":"um","width":320,"height":240,"file_size":9000}]}"#,
        );
        let file = file_handle(&msg).unwrap();
        assert_eq!(file.id, "L");
        assert_eq!(file.declared_name, "photo_ul.jpg");
    }

    #[test]
    fn unnamed_media_get_derived_names() {
        let video = parse(r#"{"message_id":1,"chat":{"id":2},"video":{"file_id":"V","file_unique_id":"uv"}}"#);
        assert_eq!(file_handle(&video).unwrap().declared_name, "video_uv.mp4");

        let audio = parse(r#"{"message_id":1,"chat":{"id":2},"audio":{"file_id":"A","file_unique_id":"ua"}}"#);
        assert_eq!(file_handle(&audio).unwrap().declared_name, "audio_ua.mp3");

        let voice = parse(r#"{"message_id":1,"chat":{"id":2},"voice":{"file_id":"O","file_unique_id":"uo","file_size":7}}"#);
        let file = file_handle(&voice).unwrap();
        assert_eq!(file.declared_name, "voice_uo.ogg");
        assert_eq!(file.declared_size, Some(7));
    }

    #[test]
    fn document_takes_precedence() {
        let msg = parse(
            r#"{"message_id":1,"chat":{"id":2},
                "document":{"file_id":"D","file_unique_id":"ud"},
                "video":{"file_id":"V","file_unique_id":"uv"}}"#,
        );
        assert_eq!(file_handle(&msg).unwrap().id, "D");
    }

    #[test]
    fn text_message_has_no_file() {
        let msg = parse(r#"{"message_id":3,"chat":{"id":2},"text":"hi"}"#);
        let inbound = inbound(&msg);
        assert!(inbound.file.is_none());
        assert_eq!(inbound.message_id, 3);
    }
}
