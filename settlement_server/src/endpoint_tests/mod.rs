mod helpers;
mod mocks;
mod orders;
mod payments;
mod shipping;
mod webhook;
