//! SQLite database handle for the Patio hub.

patio_core::define_database!(HubDatabase, "Hub database migrations complete");
