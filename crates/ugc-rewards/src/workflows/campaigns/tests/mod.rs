mod approval;
mod common;
mod notifications;
