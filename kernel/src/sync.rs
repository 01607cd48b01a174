//! Locking primitives. Both flavours come from the `spin` crate; the
//! `ticket_mutex` feature selects the fair, first-in-first-out flavour and
//! is on by default.

#[cfg(feature = "ticket_mutex")]
pub type Mutex<T> = spin::mutex::TicketMutex<T>;

#[cfg(not(feature = "ticket_mutex"))]
pub type Mutex<T> = spin::mutex::SpinMutex<T>;
