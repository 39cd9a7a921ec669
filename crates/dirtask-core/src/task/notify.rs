//! Completion notification - 終了したタスクの結果をメールで知らせる

use tracing::debug;

use super::TaskRecord;
use crate::entry::time::format_human;
use crate::error::NotificationError;
use crate::ports::EmailMessage;

impl TaskRecord {
    /// 通知先: notify-on-completion は常に、notify-on-error は成功以外のときだけ
    ///
    /// 重複は除き、最初に現れた順を保つ。
    pub fn notification_recipients(&self) -> Vec<String> {
        let state = self.state();
        let mut recipients: Vec<String> = Vec::new();
        let error_list = if state.is_successful() {
            &[][..]
        } else {
            self.notify_on_error()
        };
        for address in self.notify_on_completion().iter().chain(error_list) {
            if !recipients.contains(address) {
                recipients.push(address.clone());
            }
        }
        recipients
    }

    /// 通知メールを組み立てる。宛先が無ければ `None`
    pub fn completion_message(&self, sender: &str) -> Option<EmailMessage> {
        let recipients = self.notification_recipients();
        if recipients.is_empty() {
            return None;
        }

        let state = self.state();
        let mut message = EmailMessage::new(sender, recipients, format!("{state} {}", self.task_id()));
        message.set_body(format!(
            "Task ID:  {}\r\n\
             Task State:  {state}\r\n\
             Scheduled Start Time:  {}\r\n\
             Actual Start Time:  {}\r\n\
             Completion Time:  {}\r\n\
             \r\n\
             Log Messages:\r\n",
            self.task_id(),
            time_or_blank(self.scheduled_start_time()),
            time_or_blank(self.actual_start_time()),
            time_or_blank(self.completion_time()),
        ));
        for line in self.log_messages() {
            message.append_to_body(&line);
            message.append_to_body("\r\n");
        }
        Some(message)
    }

    /// メールサーバーが設定されていれば完了通知を送る。送ったら true
    pub async fn send_completion_notification(&self) -> Result<bool, NotificationError> {
        let mail = self.context.mail();
        if !mail.is_configured() {
            return Ok(false);
        }
        let sender = self.scheduler.notification_sender_address();
        let Some(message) = self.completion_message(&sender) else {
            debug!(task_id = %self.task_id, "no notification recipients");
            return Ok(false);
        };
        mail.send(&message).await?;
        Ok(true)
    }
}

/// 未設定（0 以下）の時刻は空欄
fn time_or_blank(millis: i64) -> String {
    if millis <= 0 {
        String::new()
    } else {
        format_human(millis)
    }
}
