use poem_openapi::Object;

#[derive(Object, Debug)]
pub struct CreateMessagesRequestDto {
    pub content: String,
    pub recipients: Vec<String>,
}
