mod confirm;
mod health;
mod helpers;
mod postgres;
mod unsubscribe;
