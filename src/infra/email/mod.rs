pub mod http_email_sender;
