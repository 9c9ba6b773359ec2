pub mod mock_keycloak;
