use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

/// Five digits, nothing else.
fn valid_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

/// Directory mutations: hotels, rooms, customers. Plain record management;
/// none of these touch booking interval data except through the cascades,
/// which run under the affected rooms' locks.
impl Engine {
    pub async fn add_hotel(
        &self,
        name: String,
        street: String,
        city: String,
        zip_code: String,
        image_url: Option<String>,
    ) -> Result<Ulid, EngineError> {
        check_len(&name, MAX_NAME_LEN, "hotel name too long")?;
        check_len(&street, MAX_NAME_LEN, "street too long")?;
        check_len(&city, MAX_NAME_LEN, "city too long")?;
        if let Some(ref url) = image_url {
            check_len(url, MAX_URL_LEN, "image url too long")?;
        }
        if !valid_zip(&zip_code) {
            return Err(EngineError::Validation("zip code must be five digits"));
        }
        if self.hotels.count().await? >= MAX_HOTELS {
            return Err(EngineError::LimitExceeded("too many hotels"));
        }

        let id = Ulid::new();
        self.persist_and_apply(&Event::HotelAdded {
            id,
            name,
            street,
            city,
            zip_code,
            image_url,
        })
        .await?;
        Ok(id)
    }

    /// Remove a hotel and everything under it: its rooms, and each removed
    /// room's bookings from the owning customers' mirrors.
    pub async fn remove_hotel(&self, hotel_id: Ulid) -> Result<(), EngineError> {
        let _hotel_guard = self.hotel_lock(hotel_id).lock_owned().await;

        if self.hotels.get(hotel_id).await?.is_none() {
            return Err(EngineError::NotFound(hotel_id));
        }

        // Hold every affected room's lock (sorted order) so no booking can
        // slip in mid-cascade.
        let mut room_ids: Vec<Ulid> = self
            .rooms
            .list_by_hotel(hotel_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        room_ids.sort();
        let mut guards = Vec::with_capacity(room_ids.len());
        for rid in &room_ids {
            guards.push(self.room_lock(*rid).lock_owned().await);
        }

        self.persist_and_apply(&Event::HotelRemoved { id: hotel_id }).await?;
        info!(%hotel_id, rooms = room_ids.len(), "hotel removed");
        Ok(())
    }

    pub async fn add_room(
        &self,
        hotel_id: Ulid,
        room_type: RoomType,
        room_number: u32,
        price_per_night: f64,
        image_url: Option<String>,
        is_available: bool,
    ) -> Result<Ulid, EngineError> {
        // Serializes the unique-room-number check against concurrent
        // add_room and remove_hotel on the same hotel.
        let _hotel_guard = self.hotel_lock(hotel_id).lock_owned().await;

        if self.hotels.get(hotel_id).await?.is_none() {
            return Err(EngineError::NotFound(hotel_id));
        }
        if !price_per_night.is_finite() || price_per_night < 0.0 {
            return Err(EngineError::Validation("price must be non-negative"));
        }
        if let Some(ref url) = image_url {
            check_len(url, MAX_URL_LEN, "image url too long")?;
        }
        if self.rooms.count().await? >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if let Some(existing) = self
            .rooms
            .list_by_hotel(hotel_id)
            .await?
            .iter()
            .find(|r| r.room_number == room_number)
        {
            return Err(EngineError::AlreadyExists(existing.id));
        }

        let id = Ulid::new();
        self.persist_and_apply(&Event::RoomAdded {
            id,
            hotel_id,
            room_type,
            room_number,
            price_per_night,
            is_available,
            image_url,
        })
        .await?;
        Ok(id)
    }

    pub async fn remove_room(&self, room_id: Ulid) -> Result<(), EngineError> {
        let _guard = self.room_lock(room_id).lock_owned().await;
        if self.rooms.get(room_id).await?.is_none() {
            return Err(EngineError::NotFound(room_id));
        }
        self.persist_and_apply(&Event::RoomRemoved { id: room_id }).await?;
        info!(%room_id, "room removed");
        Ok(())
    }

    pub async fn set_price_per_night(
        &self,
        room_id: Ulid,
        price_per_night: f64,
    ) -> Result<(), EngineError> {
        if !price_per_night.is_finite() || price_per_night < 0.0 {
            return Err(EngineError::Validation("price must be non-negative"));
        }
        if self.rooms.get(room_id).await?.is_none() {
            return Err(EngineError::NotFound(room_id));
        }
        self.persist_and_apply(&Event::RoomPriceSet { id: room_id, price_per_night })
            .await
    }

    pub async fn set_availability(
        &self,
        room_id: Ulid,
        is_available: bool,
    ) -> Result<(), EngineError> {
        if self.rooms.get(room_id).await?.is_none() {
            return Err(EngineError::NotFound(room_id));
        }
        self.persist_and_apply(&Event::RoomAvailabilitySet { id: room_id, is_available })
            .await
    }

    pub async fn add_customer(
        &self,
        name: String,
        surname: String,
        email: String,
        password: String,
    ) -> Result<Ulid, EngineError> {
        check_len(&name, MAX_NAME_LEN, "name too long")?;
        check_len(&surname, MAX_NAME_LEN, "surname too long")?;
        check_len(&email, MAX_EMAIL_LEN, "email too long")?;
        if email.is_empty() || !email.contains('@') {
            return Err(EngineError::Validation("malformed email address"));
        }
        // Serializes the unique-email check against concurrent admissions.
        let _admission = self.customer_admission.lock().await;

        if self.customers.count().await? >= MAX_CUSTOMERS {
            return Err(EngineError::LimitExceeded("too many customers"));
        }
        if let Some(existing) = self.customers.find_by_email(&email).await? {
            return Err(EngineError::AlreadyExists(existing));
        }

        let id = Ulid::new();
        self.persist_and_apply(&Event::CustomerAdded {
            id,
            name,
            surname,
            email,
            password,
        })
        .await?;
        Ok(id)
    }

    /// Blocked while the customer still has bookings — cancel those first.
    pub async fn remove_customer(&self, customer_id: Ulid) -> Result<(), EngineError> {
        let _guard = self.customer_lock(customer_id).lock_owned().await;
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or(EngineError::NotFound(customer_id))?;
        if !customer.bookings.is_empty() {
            return Err(EngineError::HasBookings(customer_id));
        }
        self.persist_and_apply(&Event::CustomerRemoved { id: customer_id }).await?;
        info!(%customer_id, "customer removed");
        Ok(())
    }

    pub async fn set_password(
        &self,
        customer_id: Ulid,
        new_password: String,
    ) -> Result<(), EngineError> {
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or(EngineError::NotFound(customer_id))?;
        if customer.password == new_password {
            return Err(EngineError::Validation(
                "new password cannot be the same as the old one",
            ));
        }
        self.persist_and_apply(&Event::PasswordSet {
            id: customer_id,
            password: new_password,
        })
        .await
    }
}
