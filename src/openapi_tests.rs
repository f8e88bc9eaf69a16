#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_schema_generation() {
        // Test that the OpenAPI schema can be generated without errors
        let openapi = ApiDoc::openapi();

        // Verify that the schema contains the expected components
        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        // Check that ErrorResponse schema is properly defined
        assert!(components.schemas.contains_key("ErrorResponse"));

        // Check that HealthResponse schema is properly defined
        assert!(components.schemas.contains_key("HealthResponse"));

        // Verify that the schema can be serialized to JSON without errors
        let json_result = serde_json::to_string(&openapi);
        assert!(json_result.is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let error_response_schema = components.schemas.get("ErrorResponse").unwrap();

        // Verify ErrorResponse has the expected structure
        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) =
            error_response_schema
        {
            let properties = &obj.properties;
            assert!(properties.contains_key("error"));
            assert!(properties.contains_key("code"));
            assert!(properties.contains_key("success"));
        } else {
            panic!("ErrorResponse should be an object schema");
        }
    }

    #[test]
    fn test_every_resource_is_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        for path in [
            "/health",
            "/api/v1/auth/signup",
            "/api/v1/auth/token",
            "/api/v1/categories",
            "/api/v1/categories/{slug}",
            "/api/v1/genres",
            "/api/v1/genres/{slug}",
            "/api/v1/titles",
            "/api/v1/titles/{title_id}",
            "/api/v1/titles/{title_id}/reviews",
            "/api/v1/titles/{title_id}/reviews/{review_id}",
            "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
            "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            "/api/v1/users",
            "/api/v1/users/me",
            "/api/v1/users/{username}",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
