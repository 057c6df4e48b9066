mod auth;
mod helpers;
mod mocks;
mod notifications;
mod orders;
mod webhook;
